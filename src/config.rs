use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    pub sensor: SensorConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EndpointsConfig {
    pub reverse_geocode_url: String, // GET, takes lat/lon/format=json
    pub ip_lookup_url: String,       // GET, no parameters
    pub form_submit_url: String,     // POST, JSON record
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SensorConfig {
    pub enabled: bool,    // When false the fix provider counts as unsupported
    pub probe_ip: String, // Address handed to the IP-geolocation service
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UiConfig {
    pub map_zoom: u32, // Initial map zoom level, leaflet-style
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoints: EndpointsConfig {
                reverse_geocode_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
                ip_lookup_url: "https://api.ipify.org/?format=json".to_string(),
                form_submit_url: "http://localhost:3000/api/formdata".to_string(),
            },
            sensor: SensorConfig {
                enabled: true,
                probe_ip: "1.1.1.1".to_string(),
            },
            ui: UiConfig {
                map_zoom: 13,
                tick_rate_ms: 150,
            },
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        let config_path = "config.toml";

        if let Ok(content) = fs::read_to_string(config_path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse config.toml: {}. Using defaults.", e),
            }
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(config_path, toml_string).is_err() {
                    warn!("Could not write default config.toml to disk.");
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml_src = r#"
            [endpoints]
            reverse_geocode_url = "http://geo.test/reverse"
            ip_lookup_url = "http://ip.test/"
            form_submit_url = "http://db.test/api/formdata"

            [sensor]
            enabled = false
            probe_ip = "198.51.100.4"

            [ui]
            map_zoom = 10
            tick_rate_ms = 200
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert!(!config.sensor.enabled);
        assert_eq!(config.ui.map_zoom, 10);
        assert_eq!(config.endpoints.form_submit_url, "http://db.test/api/formdata");
    }

    #[test]
    fn default_round_trips_through_toml() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.sensor.probe_ip, "1.1.1.1");
        assert_eq!(parsed.ui.tick_rate_ms, 150);
    }
}
