use crate::models::Profile;
use crate::profile::email_local_part;
use crate::session::Session;

/// What the digital membership card shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberCard {
    pub display_name: String,
    pub year: i32,
    /// Encoded in the QR code scanned by partners.
    pub qr_payload: String,
}

impl MemberCard {
    pub fn build(session: &Session, profile: Option<&Profile>, year: i32) -> Self {
        Self {
            display_name: display_name(session, profile),
            year,
            qr_payload: session.user_id.to_string(),
        }
    }
}

pub fn display_name(session: &Session, profile: Option<&Profile>) -> String {
    if let Some(profile) = profile {
        let first = profile.first_name.as_deref().unwrap_or_default();
        let last = profile.last_name.as_deref().unwrap_or_default();
        if !first.is_empty() || !last.is_empty() {
            return format!("{first} {last}").trim().to_owned();
        }
    }
    session
        .email
        .as_deref()
        .map(email_local_part)
        .filter(|local| !local.is_empty())
        .map(|local| local.replacen('.', " ", 1).to_uppercase())
        .unwrap_or_else(|| "ETUDIANT".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    fn session(email: Option<&str>) -> Session {
        Session {
            user_id: UserId::from("0b6c"),
            email: email.map(str::to_owned),
            access_token: "t".into(),
            refresh_token: None,
        }
    }

    #[test]
    fn profile_names_are_joined_and_trimmed() {
        let profile = Profile {
            id: UserId::from("0b6c"),
            first_name: Some("Léa".into()),
            last_name: None,
            updated_at: None,
        };
        let card = MemberCard::build(&session(None), Some(&profile), 2026);
        assert_eq!(card.display_name, "Léa");
        assert_eq!(card.qr_payload, "0b6c");
        assert_eq!(card.year, 2026);
    }

    #[test]
    fn falls_back_to_email_then_default() {
        assert_eq!(
            display_name(&session(Some("lea.bernard.2@bde.fr")), None),
            "LEA BERNARD.2"
        );
        assert_eq!(display_name(&session(None), None), "ETUDIANT");
    }
}
