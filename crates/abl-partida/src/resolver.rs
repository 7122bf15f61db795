//! Record resolver: the parcel / horizontal-property rule on top of the
//! page fetcher.
//!
//! Both entry points fetch the base record for a coordinate and branch on its
//! decoded shape. A horizontal property always takes exactly one more fetch
//! (same URL plus the `ph` discriminator) for its unit list; a plain parcel
//! resolves from its matrix identifier; anything else is "no record".

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::types::{
    horizontal_units, AblData, Coordinate, ParcelRecord, PropertyUnit, VerificationOutcome,
    MSG_NO_RECORD, MSG_NO_UNITS, MSG_RECORD_EXISTS,
};
use serde_json::Value;
use tracing::info;
use url::Url;

/// Public cadastral parcel endpoint of the Buenos Aires city registry.
pub const DEFAULT_BASE_URL: &str = "https://epok.buenosaires.gob.ar/catastro/parcela/";

/// Query key that switches the endpoint to the unit listing.
const HORIZONTAL_KEY: &str = "ph";

/// What the shared algorithm found, before shaping it per entry point.
enum Resolution {
    Units(Vec<Value>),
    Matrix(String),
    NoUnits,
    Unregistered,
}

pub struct RecordResolver {
    fetcher: PageFetcher,
    base_url: Url,
}

impl RecordResolver {
    pub fn new(fetcher: PageFetcher, base_url: Url) -> Self {
        Self { fetcher, base_url }
    }

    /// Report whether a tax record exists at `coord`.
    pub async fn verify(&self, coord: Coordinate) -> Result<VerificationOutcome> {
        info!(lat = coord.lat, lng = coord.lng, "verifying property");

        let outcome = match self.resolve(coord).await? {
            Resolution::Units(phs) => VerificationOutcome::Success {
                message: MSG_RECORD_EXISTS.to_string(),
                phs: Some(phs),
                pdamatriz: None,
            },
            Resolution::Matrix(pdamatriz) => VerificationOutcome::Success {
                message: MSG_RECORD_EXISTS.to_string(),
                phs: None,
                pdamatriz: Some(pdamatriz),
            },
            Resolution::NoUnits => VerificationOutcome::Failure {
                message: MSG_NO_UNITS.to_string(),
            },
            Resolution::Unregistered => VerificationOutcome::Failure {
                message: MSG_NO_RECORD.to_string(),
            },
        };
        Ok(outcome)
    }

    /// Fetch the tax-record identifiers at `coord`; `None` when there are none.
    pub async fn fetch_data(&self, coord: Coordinate) -> Result<Option<AblData>> {
        info!(lat = coord.lat, lng = coord.lng, "fetching ABL data");

        let data = match self.resolve(coord).await? {
            Resolution::Units(phs) => Some(AblData::Units(
                phs.iter().map(PropertyUnit::from_upstream).collect(),
            )),
            Resolution::Matrix(pdamatriz) => Some(AblData::Matrix(pdamatriz)),
            Resolution::NoUnits | Resolution::Unregistered => None,
        };
        Ok(data)
    }

    async fn resolve(&self, coord: Coordinate) -> Result<Resolution> {
        let base_url = self.record_url(coord);

        let record = self.fetcher.fetch(base_url.as_str()).await?;

        match ParcelRecord::decode(&record) {
            ParcelRecord::Horizontal => {
                let units_url = units_url(&base_url);
                let payload = self.fetcher.fetch(units_url.as_str()).await?;

                let phs = horizontal_units(&payload);
                if phs.is_empty() {
                    Ok(Resolution::NoUnits)
                } else {
                    Ok(Resolution::Units(phs))
                }
            }
            ParcelRecord::Matrix(pdamatriz) => Ok(Resolution::Matrix(pdamatriz)),
            ParcelRecord::Unregistered => Ok(Resolution::Unregistered),
        }
    }

    /// Base record URL: longitude first, then latitude.
    pub fn record_url(&self, coord: Coordinate) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("lng", &coord.lng.to_string())
            .append_pair("lat", &coord.lat.to_string());
        url
    }
}

fn units_url(base: &Url) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_key_only(HORIZONTAL_KEY);
    url
}
