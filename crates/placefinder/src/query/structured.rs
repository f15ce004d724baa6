//! Plans for structured address queries.
//!
//! Each address level either names the wanted object directly (nothing more
//! specific was given, so match the name of an object of that type) or
//! constrains the address of a more specific object (match the address
//! field of that level).

use super::common::ScoredQuery;
use super::plan::{BoolClause, Clause, Fuzziness, MatchClause, RetrievalPlan, fields};
use super::request::{StructuredAddress, StructuredRequest};
use crate::config::RelevanceParams;
use crate::document::ObjectType;

const STATE_BOOST: f32 = 0.1;
const COUNTY_BOOST: f32 = 4.0;
const CITY_BOOST: f32 = 3.0;
const POSTCODE_BOOST: f32 = 7.0;
const DISTRICT_BOOST: f32 = 2.0;
const STREET_BOOST: f32 = 5.0;
const HOUSE_NUMBER_BOOST: f32 = 10.0;
/// A city name given as the district of a finer hierarchy scores a bit
/// lower than a real city.
const DISTRICT_AS_CITY_FACTOR: f32 = 0.95;

/// Compile a structured request into a plan.
pub fn plan_structured(request: &StructuredRequest, params: &RelevanceParams, lenient: bool) -> RetrievalPlan {
    let core = AddressQuery::new(lenient).build(&request.address);

    ScoredQuery::new(core)
        .importance(params.importance_factor_alphabetic)
        .filter(house_number_filter(request.address.has_house_number()))
        .location_bias(request.options.location_bias.as_ref(), params)
        .request_filters(&request.options)
        .into_plan()
}

/// Keep house-number records out unless a house number was asked for, and
/// never return records of no specific kind.
fn house_number_filter(has_house_number: bool) -> Clause {
    let has_number = Clause::exists(fields::HOUSENUMBER);
    let is_house = Clause::term(fields::OBJECT_TYPE, ObjectType::House.name());
    let is_other = Clause::term(fields::OBJECT_TYPE, ObjectType::Other.name());

    if has_house_number {
        BoolClause::new()
            .must(BoolClause::new().should(has_number).should(Clause::not(is_house)).build())
            .must_not(is_other)
            .build()
    } else {
        BoolClause::new()
            .must_not(has_number)
            .must_not(is_house)
            .must_not(is_other)
            .build()
    }
}

struct AddressQuery {
    lenient: bool,
    query: BoolClause,
    /// Clauses locating the city-level area, reused to anchor house numbers.
    city_filter: BoolClause,
}

impl AddressQuery {
    fn new(lenient: bool) -> Self {
        Self {
            lenient,
            query: BoolClause::new(),
            city_filter: BoolClause::new(),
        }
    }

    fn build(mut self, address: &StructuredAddress) -> Clause {
        let sub_state = address.has_sub_state_details();

        if let Some(country_code) = &address.country_code {
            self.filter(Clause::term(fields::COUNTRYCODE, country_code.to_uppercase()));
            if !(address.has_state() || sub_state) {
                self.filter(Clause::term(fields::OBJECT_TYPE, ObjectType::Country.name()));
            }
        }
        if let Some(state) = &address.state {
            let clause = self.name_or_field(fields_of(ObjectType::State), state, STATE_BOOST, sub_state);
            self.query = std::mem::take(&mut self.query).should(clause);
        }
        if let Some(county) = &address.county {
            let more = address.has_city_or_postcode() || address.has_district() || address.has_street();
            let clause = self.name_or_field(fields_of(ObjectType::County), county, COUNTY_BOOST, more);
            self.must(clause);
        }
        if let Some(city) = &address.city {
            self.add_city(city, address);
        }
        if let Some(postcode) = &address.postcode {
            self.add_postcode(postcode);
        }
        if let Some(district) = &address.district {
            let clause = self.name_or_field(
                fields_of(ObjectType::District),
                district,
                DISTRICT_BOOST,
                address.has_street(),
            );
            self.add_city_related(clause);
        }
        self.add_street_and_house_number(address.street.as_deref(), address.house_number.as_deref());

        self.query.build()
    }

    fn add_city(&mut self, city: &str, address: &StructuredAddress) {
        let mut name_query = self.name_query(city, ObjectType::City).boost(CITY_BOOST).build();
        let mut field_query = self.field_query(fields_of(ObjectType::City), city, CITY_BOOST);

        if !address.has_district() {
            let boost = DISTRICT_AS_CITY_FACTOR * CITY_BOOST;
            name_query = BoolClause::new()
                .should(name_query)
                .should(self.name_query(city, ObjectType::District).boost(boost).build())
                .minimum_should_match(1)
                .build();
            field_query = BoolClause::new()
                .should(field_query)
                .should(self.field_query(fields_of(ObjectType::District), city, boost))
                .minimum_should_match(1)
                .build();
        }

        let combined = if address.has_street() || address.has_district() {
            field_query
        } else if address.has_postcode() {
            // The postcode may select a district that carries the city only
            // in its address.
            BoolClause::new().should(name_query).should(field_query).build()
        } else {
            name_query
        };

        self.add_city_related(combined);
    }

    fn add_postcode(&mut self, postcode: &str) {
        let fuzziness = Fuzziness::lenient(self.lenient);
        let clause = if postcode.contains(' ') {
            MatchClause::new(fields::POSTCODE, postcode)
                .fuzziness(fuzziness)
                .boost(POSTCODE_BOOST)
                .build()
        } else {
            Clause::Fuzzy {
                field: fields::POSTCODE.to_string(),
                value: postcode.to_string(),
                fuzziness,
                boost: POSTCODE_BOOST,
            }
        };
        self.add_city_related(clause);
    }

    fn add_street_and_house_number(&mut self, street: Option<&str>, house_number: Option<&str>) {
        let Some(street) = street else {
            if let Some(house_number) = house_number {
                // Hamlets that number their buildings without streets.
                let clause = BoolClause::new()
                    .must_not(Clause::exists(fields::STREET))
                    .must(Clause::match_phrase(fields::HOUSENUMBER, house_number))
                    .build();
                self.must(clause);
            }
            return;
        };

        let street_field = fields_of(ObjectType::Street);
        let street_query = if !self.lenient {
            self.field_query(street_field, street, STREET_BOOST)
        } else if house_number.is_none() {
            self.name_query(street, ObjectType::Street).boost(STREET_BOOST).build()
        } else {
            BoolClause::new()
                .should(self.field_query(street_field, street, 1.0))
                .should(self.name_query(street, ObjectType::Street).build())
                .minimum_should_match(1)
                .boost(STREET_BOOST)
                .build()
        };

        if let Some(house_number) = house_number {
            let mut number_match = BoolClause::new()
                .must(Clause::match_phrase(fields::HOUSENUMBER, house_number))
                .filter(self.field_query(street_field, street, 1.0));
            if !self.city_filter.is_empty() {
                number_match = number_match.filter(self.city_filter.clone().build());
            }
            let clause = BoolClause::new()
                .should(number_match.build())
                .should(Clause::not(Clause::exists(fields::HOUSENUMBER)))
                .boost(HOUSE_NUMBER_BOOST)
                .build();
            self.must(clause);
        }

        self.must(street_query);
    }

    fn must(&mut self, clause: Clause) {
        self.query = std::mem::take(&mut self.query).must(clause);
    }

    fn filter(&mut self, clause: Clause) {
        self.query = std::mem::take(&mut self.query).filter(clause);
    }

    fn add_city_related(&mut self, clause: Clause) {
        self.city_filter = std::mem::take(&mut self.city_filter).should(clause.clone());
        self.must(clause);
    }

    /// Fuzzy match in lenient mode, phrase match otherwise.
    fn field_query(&self, field: &str, value: &str, boost: f32) -> Clause {
        let field = fields::collector_field(field);
        if self.lenient {
            MatchClause::new(field, value)
                .fuzziness(Fuzziness::Auto)
                .boost(boost)
                .build()
        } else {
            Clause::MatchPhrase {
                field,
                query: value.to_string(),
                boost,
            }
        }
    }

    /// The name of an object of the given type.
    fn name_query(&self, value: &str, object_type: ObjectType) -> BoolClause {
        BoolClause::new()
            .should(self.field_query(fields::NAME, value, 1.0))
            .minimum_should_match(1)
            .filter(Clause::term(fields::OBJECT_TYPE, object_type.name()))
    }

    fn name_or_field(&self, field: &str, value: &str, boost: f32, has_more_details: bool) -> Clause {
        if has_more_details {
            self.field_query(field, value, 1.0)
        } else {
            let object_type = ObjectType::from_name(field).unwrap_or(ObjectType::Other);
            self.name_query(value, object_type).boost(boost).build()
        }
    }
}

/// Address field name of an object type's level.
fn fields_of(object_type: ObjectType) -> &'static str {
    object_type.name()
}
