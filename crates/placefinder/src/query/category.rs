//! Category filters over the `#`-prefixed category terms in `collector.all`.

use super::plan::{BoolClause, Clause, MatchClause, fields};

fn category_terms(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("#{c}"))
}

fn category_match(term: String) -> Clause {
    MatchClause::new(fields::COLLECTOR_ALL, term).build()
}

/// Documents in any of the comma-separated categories.
pub fn include_categories(list: &str) -> Clause {
    category_terms(list)
        .fold(BoolClause::new(), |b, term| b.should(category_match(term)))
        .build()
}

/// Documents in none of the comma-separated categories.
pub fn exclude_categories(list: &str) -> Clause {
    category_terms(list)
        .fold(BoolClause::new(), |b, term| b.must_not(category_match(term)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_is_any_of() {
        let Clause::Bool(include) = include_categories("osm.amenity.cafe,osm.shop") else {
            panic!("expected bool");
        };
        assert_eq!(include.should.len(), 2);
        assert_eq!(include.effective_minimum_should_match(), 1);
        assert_eq!(
            include.should[1],
            MatchClause::new("collector.all", "#osm.shop").build()
        );
    }

    #[test]
    fn test_exclude_is_none_of() {
        let Clause::Bool(exclude) = exclude_categories("osm.amenity.cafe,osm.shop") else {
            panic!("expected bool");
        };
        assert!(exclude.should.is_empty());
        assert_eq!(exclude.must_not.len(), 2);
    }
}
