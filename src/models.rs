use serde::{Deserialize, Serialize};

/// Placeholder for any optional upstream attribute that is missing or empty.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Identifies one of the eight tracked form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    Latitude,
    Longitude,
    Country,
    State,
    City,
    PostalCode,
    Zone,
    IpAddress,
}

/// Static rendering and input policy for a form field.
pub struct FieldDescriptor {
    pub id: FieldId,
    pub label: &'static str,
    pub editable: bool,
}

/// The form layout. Order matters for rendering only; the completeness
/// check in [`EnrichmentRecord::is_complete`] does not depend on it.
pub const FIELDS: [FieldDescriptor; 8] = [
    FieldDescriptor { id: FieldId::Latitude, label: "Latitude", editable: true },
    FieldDescriptor { id: FieldId::Longitude, label: "Longitude", editable: true },
    FieldDescriptor { id: FieldId::Country, label: "Country", editable: false },
    FieldDescriptor { id: FieldId::State, label: "State", editable: false },
    FieldDescriptor { id: FieldId::City, label: "City", editable: false },
    FieldDescriptor { id: FieldId::PostalCode, label: "Postal Code", editable: false },
    FieldDescriptor { id: FieldId::Zone, label: "Zone", editable: false },
    FieldDescriptor { id: FieldId::IpAddress, label: "IP Address", editable: false },
];

/// The mutable record for one enrichment cycle. Serialized field names
/// match the persistence endpoint's expected payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    pub latitude: String,
    pub longitude: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub zone: String,
    pub ip_address: String,
}

impl EnrichmentRecord {
    pub fn value(&self, id: FieldId) -> &str {
        match id {
            FieldId::Latitude => &self.latitude,
            FieldId::Longitude => &self.longitude,
            FieldId::Country => &self.country,
            FieldId::State => &self.state,
            FieldId::City => &self.city,
            FieldId::PostalCode => &self.postal_code,
            FieldId::Zone => &self.zone,
            FieldId::IpAddress => &self.ip_address,
        }
    }

    /// True only when every one of the eight fields is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.latitude.is_empty()
            && !self.longitude.is_empty()
            && !self.country.is_empty()
            && !self.state.is_empty()
            && !self.city.is_empty()
            && !self.postal_code.is_empty()
            && !self.zone.is_empty()
            && !self.ip_address.is_empty()
    }

    /// Blanks the six fields derived from enrichment, keeping the
    /// coordinate inputs. Called at the start of each acquisition cycle.
    pub fn clear_derived(&mut self) {
        self.country.clear();
        self.state.clear();
        self.city.clear();
        self.postal_code.clear();
        self.zone.clear();
        self.ip_address.clear();
    }

    /// Copies the mapped subset of a resolved address into the record,
    /// substituting the sentinel for absent or empty attributes.
    pub fn apply_address(&mut self, addr: &ResolvedAddress) {
        self.country = or_sentinel(&addr.country);
        self.state = or_sentinel(&addr.state);
        self.city = or_sentinel(&addr.city);
        self.postal_code = or_sentinel(&addr.postcode);
        self.zone = or_sentinel(&addr.state_district);
    }
}

fn or_sentinel(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Structured address as returned by the reverse-geocoding service.
/// The upstream object is an open set; anything we don't use is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolvedAddress {
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state_district: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

impl ResolvedAddress {
    /// One-line display form used by the address card and the map popup.
    /// Missing attributes render as empty, never as the sentinel.
    pub fn summary(&self) -> String {
        let part = |v: &Option<String>| v.clone().unwrap_or_default();
        format!(
            "{} {}, {}, {}, {}, {}, {}",
            part(&self.suburb),
            part(&self.city),
            part(&self.county),
            part(&self.state_district),
            part(&self.state),
            part(&self.postcode),
            part(&self.country),
        )
    }
}

/// Top-level reverse-geocoding response: either an error indicator or
/// an address object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub address: Option<ResolvedAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpResponse {
    #[serde(default)]
    pub ip: Option<String>,
}
