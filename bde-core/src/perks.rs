use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::models::Perk;
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Map,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::List => ViewMode::Map,
            ViewMode::Map => ViewMode::List,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Dijon city centre, where the partners are.
    pub const DIJON: MapRegion = MapRegion {
        latitude: 47.329,
        longitude: 5.048,
        latitude_delta: 0.0922,
        longitude_delta: 0.0421,
    };
}

pub fn fallback_perks() -> Vec<Perk> {
    vec![
        Perk {
            id: 1,
            title: "Verre à 5€".into(),
            description: "Sur tous les bières et softs".into(),
            company: "Le 3310".into(),
            latitude: Some(47.317525421186474),
            longitude: Some(5.034653223942003),
        },
        Perk {
            id: 2,
            title: "Réduction 50%".into(),
            description: "Sur tous les jeux de sociétés".into(),
            company: "Jocade".into(),
            latitude: Some(47.32065992339084),
            longitude: Some(5.038216247569747),
        },
        Perk {
            id: 3,
            title: "Pinte à 4€".into(),
            description: "Sur la bière blonde".into(),
            company: "Le Cellier".into(),
            latitude: Some(47.325747011287596),
            longitude: Some(5.033844158877657),
        },
    ]
}

/// Partner perks, shown as a list or as map markers.
#[derive(Clone)]
pub struct PerkDirectory {
    store: Arc<dyn RemoteStore>,
    perks: Arc<RwLock<Vec<Perk>>>,
}

impl PerkDirectory {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            perks: Arc::default(),
        }
    }

    /// Returns `true` when backend data was used, `false` on fallback.
    pub async fn load(&self) -> bool {
        let (perks, remote) = match self.store.fetch_perks().await {
            Ok(perks) if !perks.is_empty() => (perks, true),
            Ok(_) => (fallback_perks(), false),
            Err(e) => {
                warn!(error = %e, "failed to fetch perks, using placeholder partners");
                (fallback_perks(), false)
            }
        };
        *self.perks.write().await = perks;
        remote
    }

    pub async fn list(&self) -> Vec<Perk> {
        self.perks.read().await.clone()
    }

    /// Perks that can be pinned on the map.
    pub async fn markers(&self) -> Vec<Perk> {
        self.perks
            .read()
            .await
            .iter()
            .filter(|perk| perk.coordinates().is_some())
            .cloned()
            .collect()
    }
}
