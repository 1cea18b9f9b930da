use crate::domain::model::Layer;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Reads vendor geodata files into layers.
pub trait LayerSource: Send + Sync {
    /// A shapefile together with its DBF attributes.
    fn read_shapes(&self, path: &Path) -> Result<Layer>;
    /// A standalone DBF table; features carry no geometry.
    fn read_table(&self, path: &Path) -> Result<Layer>;
}

/// Scratch storage holding the layers of the run and the reference layers.
pub trait LayerStore {
    /// Store a layer, replacing any layer with the same name.
    fn write_layer(&self, layer: &Layer) -> Result<()>;
    fn read_layer(&self, name: &str) -> Result<Option<Layer>>;
    fn layer_names(&self) -> Result<Vec<String>>;
    /// Returns whether a layer was actually dropped.
    fn drop_layer(&self, name: &str) -> Result<bool>;

    fn drop_layers(&self, names: &[String]) -> Result<usize> {
        let mut dropped = 0;
        for name in names {
            if self.drop_layer(name)? {
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    /// Drop every layer not listed in `keep`, returning the dropped names.
    fn clear_except(&self, keep: &[String]) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for name in self.layer_names()? {
            if !keep.contains(&name) && self.drop_layer(&name)? {
                dropped.push(name);
            }
        }
        Ok(dropped)
    }
}

/// Remote service holding the authoritative boundary database.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn fetch_layer(&self, remote_name: &str, local_name: &str) -> Result<Layer>;
}
