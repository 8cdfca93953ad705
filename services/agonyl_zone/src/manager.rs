//! Owns one zone per configured map: loads the item catalog once, loads
//! map and spawn content, resolves spawn NPCs lazily, and runs the zone
//! tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use agonyl_data::{load_spawns, ItemCatalog, MapData, NpcData};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::player::Players;
use crate::zone::{new_zone, ResolvedSpawn, ZoneHandle};

pub(crate) struct ZoneManager {
    zones: HashMap<u16, ZoneHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    npc_path: PathBuf,
    npc_cache: DashMap<u16, Arc<NpcData>>,
}

impl ZoneManager {
    /// Loads all content and spawns one task per map.
    pub(crate) fn start(cfg: &Config, players: Players) -> anyhow::Result<Arc<Self>> {
        let catalog = Arc::new(ItemCatalog::load_dir(&cfg.item_data_path)?);
        let (shutdown, _) = watch::channel(false);

        let mut manager = Self {
            zones: HashMap::new(),
            tasks: Mutex::new(Vec::new()),
            shutdown,
            npc_path: PathBuf::from(&cfg.npc_data_path),
            npc_cache: DashMap::new(),
        };

        let map_path = PathBuf::from(&cfg.map_data_path);
        let spawn_path = PathBuf::from(&cfg.spawn_data_path);

        let mut pending = Vec::new();
        for &map_id in &cfg.maps.0 {
            let map_data = MapData::load(map_path.join(map_id.to_string()))?;

            let spawns = match load_spawns(spawn_path.join(map_id.to_string())) {
                Ok(spawns) => spawns,
                Err(e) => {
                    warn!(map_id, "no spawn table: {e}");
                    Vec::new()
                }
            };

            let resolved = spawns
                .into_iter()
                .map(|spawn| ResolvedSpawn {
                    npc: manager.npc_data(spawn.id),
                    spawn,
                })
                .collect();

            let (handle, task) = new_zone(
                map_data,
                resolved,
                Arc::clone(&catalog),
                Arc::clone(&players),
                manager.shutdown.subscribe(),
            );

            manager.zones.insert(map_id, handle);
            pending.push(task);
        }

        let manager = Arc::new(manager);
        {
            let mut tasks = manager.tasks.lock();
            for task in pending {
                tasks.push(tokio::spawn(task.run()));
            }
        }

        info!(zones = manager.zones.len(), "zone manager started");
        Ok(manager)
    }

    pub(crate) fn zone_for_map(&self, map_id: u16) -> Option<ZoneHandle> {
        self.zones.get(&map_id).cloned()
    }

    /// The maps announced to the MainServer.
    pub(crate) fn maps(&self) -> Vec<u16> {
        self.zones.keys().copied().collect()
    }

    /// NPC records load on first use and stay cached.
    pub(crate) fn npc_data(&self, id: u16) -> Option<Arc<NpcData>> {
        if let Some(npc) = self.npc_cache.get(&id) {
            return Some(Arc::clone(&npc));
        }

        match NpcData::load(self.npc_path.join(id.to_string())) {
            Ok(npc) => {
                let npc = Arc::new(npc);
                self.npc_cache.insert(id, Arc::clone(&npc));
                Some(npc)
            }
            Err(e) => {
                warn!(npc_id = id, "failed to load npc record: {e}");
                None
            }
        }
    }

    /// Signals every zone task and joins them.
    pub(crate) async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}
