use serde::Deserialize;

/// Envelope every CountriesNow response uses.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub error: bool,
    #[serde(default)]
    pub msg: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryCities {
    pub country: String,
    #[serde(default)]
    pub cities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountryStates {
    pub name: String,
    #[serde(default)]
    pub states: Vec<StateEntry>,
}

#[derive(Debug, Deserialize)]
pub struct StateEntry {
    pub name: String,
}
