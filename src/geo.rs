//! Best-effort location lookup used when a scan carries no coordinates.

use serde::Deserialize;
use thiserror::Error;

use crate::http_client;

/// Default ip-api compatible endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json/";

const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Source of an approximate `(latitude, longitude)` for this machine.
pub trait Locate {
    fn locate(&self) -> Option<(f64, f64)>;
}

impl<F> Locate for F
where
    F: Fn() -> Option<(f64, f64)>,
{
    fn locate(&self) -> Option<(f64, f64)> {
        self()
    }
}

/// Locator that never knows where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl Locate for NoLocation {
    fn locate(&self) -> Option<(f64, f64)> {
        None
    }
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Geolocation request failed: {0}")]
    Request(Box<ureq::Error>),
    #[error("Failed to read geolocation response: {0}")]
    Read(#[from] std::io::Error),
    #[error("Invalid geolocation response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Geolocation response has no usable coordinates")]
    MissingCoordinates,
}

impl From<ureq::Error> for GeoError {
    fn from(err: ureq::Error) -> Self {
        Self::Request(Box::new(err))
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Looks up the public IP's approximate position over HTTP.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    endpoint: String,
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl IpGeolocator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query the endpoint, reporting why no position was obtained.
    pub fn lookup(&self) -> Result<(f64, f64), GeoError> {
        let response = http_client::agent().get(&self.endpoint).call()?;
        let bytes = http_client::read_response_bytes(response, MAX_RESPONSE_BYTES)?;
        let body: IpApiResponse = serde_json::from_slice(&bytes)?;
        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok((lat, lon)),
            _ => Err(GeoError::MissingCoordinates),
        }
    }
}

impl Locate for IpGeolocator {
    fn locate(&self) -> Option<(f64, f64)> {
        match self.lookup() {
            Ok(position) => Some(position),
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, %err, "geolocation unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::test_server::serve_once;

    fn json_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn reads_lat_lon_from_endpoint() {
        let url = serve_once(json_response(
            r#"{"status":"success","country":"NL","lat":52.37,"lon":4.89}"#,
        ));
        assert_eq!(IpGeolocator::new(url).locate(), Some((52.37, 4.89)));
    }

    #[test]
    fn missing_coordinates_yield_none() {
        let url = serve_once(json_response(r#"{"status":"fail","message":"private range"}"#));
        let locator = IpGeolocator::new(url);
        assert!(matches!(locator.lookup(), Err(GeoError::MissingCoordinates)));
    }

    #[test]
    fn server_error_yields_none() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n".into());
        assert_eq!(IpGeolocator::new(url).locate(), None);
    }

    #[test]
    fn closures_and_no_location_implement_locate() {
        let fixed = || Some((1.0, 2.0));
        assert_eq!(fixed.locate(), Some((1.0, 2.0)));
        assert_eq!(NoLocation.locate(), None);
    }
}
