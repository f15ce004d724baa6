//! Validated search requests.
//!
//! Parsing helpers turn raw parameter strings into typed values and reject
//! anything malformed with [`QueryError::BadRequest`]. Checks that need the
//! engine configuration (supported languages, result caps) happen in
//! [`RequestOptions::validate`].

use std::collections::BTreeSet;

use placefinder_data_processing::{Envelope, Point};

use super::error::{QueryError, Result};
use super::tag_filter::TagFilter;
use crate::config::EngineConfig;
use crate::document::{ObjectType, is_valid_category};

const DEFAULT_BIAS_SCALE: f64 = 0.2;
const DEFAULT_BIAS_ZOOM: i32 = 14;
const MAX_BIAS_ZOOM: i32 = 18;

/// Parse `minLon,minLat,maxLon,maxLat`.
pub fn parse_bbox(value: &str) -> Result<Envelope> {
    let invalid =
        || QueryError::bad_request("invalid search term 'bbox', expected format is: minLon,minLat,maxLon,maxLat");

    let coords = value
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>>>()?;
    let [min_lon, min_lat, max_lon, max_lat] = coords.as_slice() else {
        return Err(invalid());
    };
    let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
    let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
    if !(lon_ok(*min_lon) && lon_ok(*max_lon) && lat_ok(*min_lat) && lat_ok(*max_lat)) {
        return Err(invalid());
    }
    Ok(Envelope::new(*min_lon, *min_lat, *max_lon, *max_lat))
}

/// Parse layer names into object types.
pub fn parse_layers<I, S>(layers: I) -> Result<BTreeSet<ObjectType>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    layers
        .into_iter()
        .map(|layer| {
            let layer = layer.as_ref();
            ObjectType::from_name(layer).ok_or_else(|| {
                let available: Vec<&str> = ObjectType::ALL.iter().map(|t| t.name()).collect();
                QueryError::bad_request(format!(
                    "Unknown layer type '{layer}'. Available layers: {}",
                    available.join(", ")
                ))
            })
        })
        .collect()
}

fn check_point(point: Point, what: &str) -> Result<Point> {
    if point.is_valid() {
        Ok(point)
    } else {
        Err(QueryError::bad_request(format!(
            "Invalid value for '{what}': lat must be within [-90, 90] and lon within [-180, 180]."
        )))
    }
}

fn check_category_list(list: &str) -> Result<String> {
    let list = list.trim();
    if list.is_empty() || !list.split(',').all(is_valid_category) {
        return Err(QueryError::bad_request(format!(
            "Invalid category list '{list}': expected comma-separated categories like osm.amenity.cafe."
        )));
    }
    Ok(list.to_string())
}

/// Boost results near a point, fading with distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationBias {
    pub point: Point,
    /// 0 gives the strongest bias, 1 disables it.
    pub scale: f64,
    pub zoom: i32,
}

impl LocationBias {
    pub fn new(point: Point) -> Result<Self> {
        Ok(Self {
            point: check_point(point, "location bias")?,
            scale: DEFAULT_BIAS_SCALE,
            zoom: DEFAULT_BIAS_ZOOM,
        })
    }

    pub fn scale(mut self, scale: f64) -> Result<Self> {
        if scale.is_nan() {
            return Err(QueryError::bad_request(
                "Invalid parameter 'location_bias_scale': NaN is not allowed",
            ));
        }
        self.scale = scale.clamp(0.0, 1.0);
        Ok(self)
    }

    pub fn zoom(mut self, zoom: i32) -> Self {
        self.zoom = zoom.clamp(0, MAX_BIAS_ZOOM);
        self
    }

    /// Radius of full effect in km, `None` when the zoom is too coarse for
    /// a bias to make sense.
    pub fn radius_km(&self) -> Option<f64> {
        if self.zoom < 4 {
            return None;
        }
        let zoom = self.zoom.min(MAX_BIAS_ZOOM);
        Some(f64::from(1_u32 << (MAX_BIAS_ZOOM - zoom)) * 0.25)
    }
}

/// Options shared by every request kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub language: Option<String>,
    pub limit: Option<usize>,
    pub bbox: Option<Envelope>,
    pub location_bias: Option<LocationBias>,
    pub tag_filters: Vec<TagFilter>,
    pub layers: BTreeSet<ObjectType>,
    /// Each entry is one comma-separated list; entries are AND-ed.
    pub include_categories: Vec<String>,
    pub exclude_categories: Vec<String>,
    pub dedupe: bool,
    pub return_geometry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            language: None,
            limit: None,
            bbox: None,
            location_bias: None,
            tag_filters: Vec::new(),
            layers: BTreeSet::new(),
            include_categories: Vec::new(),
            exclude_categories: Vec::new(),
            dedupe: true,
            return_geometry: false,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub const fn bbox(mut self, bbox: Envelope) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn bbox_str(self, bbox: &str) -> Result<Self> {
        Ok(self.bbox(parse_bbox(bbox)?))
    }

    pub const fn location_bias(mut self, bias: LocationBias) -> Self {
        self.location_bias = Some(bias);
        self
    }

    pub fn tag_filter(mut self, filter: TagFilter) -> Self {
        self.tag_filters.push(filter);
        self
    }

    pub fn osm_tag(self, filter: &str) -> Result<Self> {
        Ok(self.tag_filter(TagFilter::parse(filter)?))
    }

    pub fn layers<I, S>(mut self, layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.layers.extend(parse_layers(layers)?);
        Ok(self)
    }

    pub fn include_categories(mut self, list: &str) -> Result<Self> {
        self.include_categories.push(check_category_list(list)?);
        Ok(self)
    }

    pub fn exclude_categories(mut self, list: &str) -> Result<Self> {
        self.exclude_categories.push(check_category_list(list)?);
        Ok(self)
    }

    pub const fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub const fn return_geometry(mut self, return_geometry: bool) -> Self {
        self.return_geometry = return_geometry;
        self
    }

    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if let Some(language) = &self.language
            && language != "default"
            && !config.supports_language(language)
        {
            return Err(QueryError::bad_request(format!(
                "Language is not supported. Supported are: default, {}",
                config.languages.join(", ")
            )));
        }
        Ok(())
    }

    pub fn resolved_language<'a>(&'a self, config: &'a EngineConfig) -> &'a str {
        self.language.as_deref().unwrap_or(&config.default_language)
    }

    /// Requested limit, or `default`, clamped to `[1, max]`.
    pub fn resolved_limit(&self, default: usize, max: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, max.max(1))
    }
}

/// A free-text search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FreeTextRequest {
    /// `None` for category-only searches.
    pub query: Option<String>,
    pub options: RequestOptions,
}

impl FreeTextRequest {
    pub fn new(query: &str) -> Self {
        let query = query.trim();
        Self {
            query: (!query.is_empty()).then(|| query.to_string()),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if self.query.is_none() && self.options.include_categories.is_empty() {
            return Err(QueryError::bad_request(
                "q parameter is required when no include categories are specified",
            ));
        }
        self.options.validate(config)
    }
}

/// The address fields of a structured search, most general first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredAddress {
    pub country_code: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub district: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
}

macro_rules! address_setter {
    ($($name:ident),*) => {
        $(
            pub fn $name(mut self, value: &str) -> Self {
                let value = value.trim();
                self.$name = (!value.is_empty()).then(|| value.to_string());
                self
            }
        )*
    };
}

impl StructuredAddress {
    address_setter!(country_code, state, county, city, postcode, district, street, house_number);

    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && !self.has_state() && !self.has_sub_state_details()
    }

    pub const fn has_state(&self) -> bool {
        self.state.is_some()
    }

    pub const fn has_county(&self) -> bool {
        self.county.is_some()
    }

    pub const fn has_city_or_postcode(&self) -> bool {
        self.city.is_some() || self.postcode.is_some()
    }

    pub const fn has_postcode(&self) -> bool {
        self.postcode.is_some()
    }

    pub const fn has_district(&self) -> bool {
        self.district.is_some()
    }

    /// A house number implies a street, even an unnamed one.
    pub const fn has_street(&self) -> bool {
        self.street.is_some() || self.has_house_number()
    }

    pub const fn has_house_number(&self) -> bool {
        self.house_number.is_some()
    }

    pub const fn has_sub_state_details(&self) -> bool {
        self.has_county() || self.has_city_or_postcode() || self.has_district() || self.has_street()
    }

    /// The same address with street and house number removed.
    pub fn without_street(&self) -> Self {
        Self {
            street: None,
            house_number: None,
            ..self.clone()
        }
    }
}

/// A search by discrete address fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredRequest {
    pub address: StructuredAddress,
    pub options: RequestOptions,
}

impl StructuredRequest {
    pub fn new(address: StructuredAddress) -> Self {
        Self {
            address,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        if self.address.is_empty() {
            return Err(QueryError::bad_request(
                "At least one of the address fields must be given.",
            ));
        }
        self.options.validate(config)
    }
}

/// Find places around a point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseRequest {
    pub location: Point,
    pub radius_km: f64,
    /// Raw query string the results must also match.
    pub query: Option<String>,
    pub distance_sort: bool,
    pub options: RequestOptions,
}

impl ReverseRequest {
    pub const DEFAULT_RADIUS_KM: f64 = 1.0;

    pub fn new(location: Point) -> Result<Self> {
        Ok(Self {
            location: check_point(location, "lat/lon")?,
            radius_km: Self::DEFAULT_RADIUS_KM,
            query: None,
            distance_sort: true,
            options: RequestOptions::default(),
        })
    }

    /// Set the search radius. Must be positive; it is capped by
    /// [`EngineConfig::reverse_max_radius_km`] during validation.
    pub fn radius_km(mut self, radius_km: f64) -> Result<Self> {
        if radius_km.is_nan() || radius_km <= 0.0 {
            return Err(QueryError::bad_request(
                "invalid search term 'radius', expected a strictly positive number.",
            ));
        }
        self.radius_km = radius_km;
        Ok(self)
    }

    pub fn query(mut self, query: &str) -> Self {
        let query = query.trim();
        self.query = (!query.is_empty()).then(|| query.to_string());
        self
    }

    pub const fn distance_sort(mut self, distance_sort: bool) -> Self {
        self.distance_sort = distance_sort;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        self.options.validate(config)
    }

    pub fn effective_radius_km(&self, config: &EngineConfig) -> f64 {
        self.radius_km.min(config.reverse_max_radius_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("9.6,52.3,9.8,52.4").unwrap();
        assert_eq!((bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat), (9.6, 52.3, 9.8, 52.4));

        for bad in ["9.6,52.3,9.8", "a,b,c,d", "190,0,10,10", "0,-95,10,10", ""] {
            assert!(parse_bbox(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_layers() {
        let layers = parse_layers(["city", "street"]).unwrap();
        assert!(layers.contains(&ObjectType::City));
        assert_eq!(layers.len(), 2);
        assert!(matches!(parse_layers(["town"]), Err(QueryError::BadRequest { .. })));
    }

    #[test]
    fn test_options_validation() {
        let config = EngineConfig::default();
        assert!(RequestOptions::new().language("de").validate(&config).is_ok());
        assert!(RequestOptions::new().language("default").validate(&config).is_ok());
        assert!(RequestOptions::new().language("xx").validate(&config).is_err());

        assert!(RequestOptions::new().include_categories("osm.amenity,osm.shop.bakery").is_ok());
        assert!(RequestOptions::new().include_categories("amenity").is_err());
        assert!(RequestOptions::new().exclude_categories("osm.a,").is_err());
        assert!(RequestOptions::new().osm_tag("a:b:c").is_err());
    }

    #[test]
    fn test_limit_resolution() {
        let options = RequestOptions::new();
        assert_eq!(options.resolved_limit(15, 50), 15);
        assert_eq!(options.clone().limit(0).resolved_limit(15, 50), 1);
        assert_eq!(options.limit(500).resolved_limit(15, 50), 50);
    }

    #[test]
    fn test_location_bias_radius() {
        let bias = LocationBias::new(Point::new(10.0, 50.0)).unwrap();
        assert_eq!(bias.zoom, 14);
        assert!((bias.radius_km().unwrap() - 4.0).abs() < 1e-9);
        assert!((bias.zoom(18).radius_km().unwrap() - 0.25).abs() < 1e-9);
        assert!(bias.zoom(30).radius_km().is_some());
        assert!(bias.zoom(3).radius_km().is_none());
        assert!((bias.scale(7.0).unwrap().scale - 1.0).abs() < 1e-9);
        assert!(bias.scale(f64::NAN).is_err());
        assert!(LocationBias::new(Point::new(200.0, 0.0)).is_err());
    }

    #[test]
    fn test_structured_details() {
        let address = StructuredAddress::default().country_code("de").house_number("5");
        assert!(address.has_street());
        assert!(address.has_sub_state_details());
        assert!(!address.without_street().has_street());
        assert!(StructuredAddress::default().city("  ").is_empty());
    }

    #[test]
    fn test_reverse_request() {
        let config = EngineConfig::default();
        let request = ReverseRequest::new(Point::new(13.4, 52.5)).unwrap();
        assert!(request.distance_sort);
        assert!(request.clone().radius_km(0.0).is_err());
        assert!(request.clone().radius_km(-1.0).is_err());
        let far = request.radius_km(9000.0).unwrap();
        assert!((far.effective_radius_km(&config) - 5000.0).abs() < 1e-9);
        assert!(ReverseRequest::new(Point::new(0.0, 91.0)).is_err());
    }

    #[test]
    fn test_free_text_needs_query_or_categories() {
        let config = EngineConfig::default();
        assert!(FreeTextRequest::new("  ").validate(&config).is_err());
        let categories_only = FreeTextRequest::new("")
            .with_options(RequestOptions::new().include_categories("osm.place.city").unwrap());
        assert!(categories_only.validate(&config).is_ok());
    }
}
