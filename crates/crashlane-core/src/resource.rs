// Resource descriptor: device, OS, app build and network context of a session

use serde::{Deserialize, Serialize};

use crate::event::trim_nul;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub device_name: String,
    pub device_model: String,
    pub device_manufacturer: String,
    pub device_type: String,
    pub device_is_foldable: bool,
    pub device_is_physical: bool,
    pub device_density_dpi: u16,
    pub device_width_px: u16,
    pub device_height_px: u16,
    pub device_density: f32,
    pub os_name: String,
    pub os_version: String,
    pub platform: String,
    pub app_version: String,
    pub app_build: String,
    pub app_unique_id: String,
    #[serde(alias = "measure_sdk_version")]
    pub sdk_version: String,
    pub network_type: String,
    pub network_generation: String,
    pub network_provider: String,
    pub device_locale: String,
}

impl Resource {
    /// Strip NUL padding from every string field
    pub fn trim(&mut self) {
        for field in [
            &mut self.device_name,
            &mut self.device_model,
            &mut self.device_manufacturer,
            &mut self.device_type,
            &mut self.os_name,
            &mut self.os_version,
            &mut self.platform,
            &mut self.app_version,
            &mut self.app_build,
            &mut self.app_unique_id,
            &mut self.sdk_version,
            &mut self.network_type,
            &mut self.network_generation,
            &mut self.network_provider,
            &mut self.device_locale,
        ] {
            trim_nul(field);
        }
    }

    /// Key used to find the deobfuscation mapping for this build
    pub fn mapping_lookup(&self) -> (&str, &str, &str) {
        (&self.app_unique_id, &self.app_version, &self.app_build)
    }
}
