//! Query compiler that turns a criteria chain into a boolean query tree.

use crate::criteria::{Criteria, CriteriaChain, CriteriaEntry, Literal};
use crate::query::{
    BoolQuery, DefaultOperator, FuzzyQuery, NestedQuery, Query, QueryStringQuery, RangeQuery,
};
use tracing::{debug, trace};

/// Stateless compiler from [`CriteriaChain`] to [`Query`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaQueryCompiler;

/// Where the first fragment of a chain ends up once the rest is known.
enum FirstPlacement {
    Should,
    MustNot,
    Must,
}

/// Fragments collected while walking a chain.
///
/// The first fragment is held apart together with its node's negation flag,
/// because its role depends on what follows it.
#[derive(Default)]
struct Buckets {
    first: Option<(Query, bool)>,
    should: Vec<Query>,
    must_not: Vec<Query>,
    must: Vec<Query>,
}

impl Buckets {
    fn route(&mut self, criteria: &Criteria, fragment: Query) {
        if self.first.is_none() {
            self.first = Some((fragment, criteria.is_negating()));
        } else if criteria.is_or() {
            self.should.push(fragment);
        } else if criteria.is_negating() {
            self.must_not.push(fragment);
        } else {
            self.must.push(fragment);
        }
    }

    fn into_query(self) -> Option<Query> {
        let (first, negated) = self.first?;
        let placement = first_placement(&self.should, &self.must_not, &self.must, negated);

        let mut query = BoolQuery::new();
        match placement {
            FirstPlacement::Should => query.should.push(first),
            FirstPlacement::MustNot => query.must_not.push(first),
            FirstPlacement::Must => query.must.push(first),
        }
        query.should.extend(self.should);
        query.must_not.extend(self.must_not);
        query.must.extend(self.must);

        debug!(
            should = query.should.len(),
            must_not = query.must_not.len(),
            must = query.must.len(),
            "Assembled boolean query"
        );
        Some(query.into())
    }
}

/// A chain made only of disjunctions folds its first term into `should`;
/// anything else keeps the first term required, or forbidden when negated.
fn first_placement(
    should: &[Query],
    must_not: &[Query],
    must: &[Query],
    negated: bool,
) -> FirstPlacement {
    if !should.is_empty() && must_not.is_empty() && must.is_empty() {
        FirstPlacement::Should
    } else if negated {
        FirstPlacement::MustNot
    } else {
        FirstPlacement::Must
    }
}

impl CriteriaQueryCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles a whole chain into one boolean query.
    ///
    /// Returns `None` when no node produces a fragment, including for an empty
    /// chain.
    ///
    /// # Panics
    ///
    /// Panics if a node with at least one entry has an empty field name.
    pub fn compile(&self, chain: &CriteriaChain) -> Option<Query> {
        let mut buckets = Buckets::default();

        for (index, criteria) in chain.iter().enumerate() {
            match self.compile_fragment(criteria) {
                Some(fragment) => buckets.route(criteria, fragment),
                None => trace!(
                    index,
                    field = criteria.field().name(),
                    "Node produced no fragment"
                ),
            }
        }

        buckets.into_query()
    }

    /// Compiles the entries of a single node into one fragment.
    ///
    /// # Panics
    ///
    /// Panics if the node has entries but an empty field name.
    pub fn compile_fragment(&self, criteria: &Criteria) -> Option<Query> {
        let entries = criteria.entries();
        if entries.is_empty() {
            return None;
        }

        let field = criteria.field();
        let field_name = field.name();
        assert!(!field_name.is_empty(), "Unknown field");

        let mut query = match entries {
            [entry] => self.compile_entry(entry, field_name)?,
            _ => {
                let clauses: Vec<Query> = entries
                    .iter()
                    .filter_map(|entry| self.compile_entry(entry, field_name))
                    .collect();
                if clauses.is_empty() {
                    return None;
                }
                Query::Bool(BoolQuery {
                    must: clauses,
                    ..BoolQuery::default()
                })
            }
        };

        if let Some(root) = field.nested_root() {
            query = NestedQuery::new(root, query).into();
        }

        if let Some(boost) = criteria.boost().filter(|boost| !boost.is_nan()) {
            if !query.set_boost(boost) {
                debug!(field = field_name, boost, "Boost ignored on boolean fragment");
            }
        }

        Some(query)
    }

    /// Maps one condition entry onto a query clause. Null values yield `None`.
    fn compile_entry(&self, entry: &CriteriaEntry, field: &str) -> Option<Query> {
        if entry.is_null() {
            trace!(field, op = %entry.key(), "Skipping entry without value");
            return None;
        }

        let query = match entry {
            CriteriaEntry::Equals(value) => QueryStringQuery::new(value.to_string(), field)
                .default_operator(DefaultOperator::And)
                .into(),
            CriteriaEntry::Contains(value) => QueryStringQuery::new(format!("*{}*", value), field)
                .analyze_wildcard(true)
                .into(),
            CriteriaEntry::StartsWith(value) => QueryStringQuery::new(format!("{}*", value), field)
                .analyze_wildcard(true)
                .into(),
            CriteriaEntry::EndsWith(value) => QueryStringQuery::new(format!("*{}", value), field)
                .analyze_wildcard(true)
                .into(),
            CriteriaEntry::Expression(value) => {
                QueryStringQuery::new(value.to_string(), field).into()
            }
            CriteriaEntry::Less(value) => RangeQuery::new(field).lt(value.clone()).into(),
            CriteriaEntry::LessEqual(value) => RangeQuery::new(field).lte(value.clone()).into(),
            CriteriaEntry::Greater(value) => RangeQuery::new(field).gt(value.clone()).into(),
            CriteriaEntry::GreaterEqual(value) => RangeQuery::new(field).gte(value.clone()).into(),
            CriteriaEntry::Between(from, to) => RangeQuery::new(field)
                .between(from.clone(), to.clone())
                .into(),
            CriteriaEntry::Fuzzy(value) => FuzzyQuery::new(field, value.to_string()).into(),
            CriteriaEntry::In(values) => BoolQuery {
                should: self.compile_terms(values, field),
                ..BoolQuery::default()
            }
            .into(),
            CriteriaEntry::NotIn(values) => BoolQuery {
                must_not: self.compile_terms(values, field),
                ..BoolQuery::default()
            }
            .into(),
        };

        Some(query)
    }

    /// One free-text match per collection element. Null elements are skipped.
    fn compile_terms(&self, values: &[Literal], field: &str) -> Vec<Query> {
        values
            .iter()
            .filter(|value| !value.is_null())
            .map(|value| QueryStringQuery::new(value.to_string(), field).into())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Field;
    use crate::query::RangeBound;
    use serde_json::json;

    fn compiler() -> CriteriaQueryCompiler {
        CriteriaQueryCompiler::new()
    }

    fn equals(value: &str, field: &str) -> Query {
        QueryStringQuery::new(value, field)
            .default_operator(DefaultOperator::And)
            .into()
    }

    #[test]
    fn test_chain_without_entries_compiles_to_nothing() {
        let chain = CriteriaChain::where_field("name").and("age").or("city");
        assert_eq!(compiler().compile(&chain), None);
        assert_eq!(compiler().compile(&CriteriaChain::default()), None);
    }

    #[test]
    fn test_single_node_is_required_fragment() {
        let chain = CriteriaChain::where_field("name").is("foo");
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(fragment, equals("foo", "name"));

        let query = compiler().compile(&chain).unwrap();
        assert_eq!(query, BoolQuery::new().must(fragment).into());
    }

    #[test]
    fn test_disjunction_collects_first_term_into_should() {
        let chain = CriteriaChain::where_field("a").is("1").or("b").is("2");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.should, vec![equals("1", "a"), equals("2", "b")]);
        assert!(bool_query.must.is_empty());
        assert!(bool_query.must_not.is_empty());
    }

    #[test]
    fn test_negated_second_node_goes_to_must_not() {
        let chain = CriteriaChain::where_field("a").is("1").and("b").not().is("2");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.must, vec![equals("1", "a")]);
        assert_eq!(bool_query.must_not, vec![equals("2", "b")]);
        assert!(bool_query.should.is_empty());
    }

    #[test]
    fn test_negated_first_node_in_mixed_chain_is_forbidden() {
        let chain = CriteriaChain::where_field("a")
            .not()
            .is("1")
            .or("b")
            .is("2")
            .and("c")
            .is("3");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.should, vec![equals("2", "b")]);
        assert_eq!(bool_query.must_not, vec![equals("1", "a")]);
        assert_eq!(bool_query.must, vec![equals("3", "c")]);
    }

    #[test]
    fn test_negated_first_node_in_pure_disjunction_joins_should() {
        let chain = CriteriaChain::where_field("a").not().is("1").or("b").is("2");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.should, vec![equals("1", "a"), equals("2", "b")]);
        assert!(bool_query.must_not.is_empty());
    }

    #[test]
    fn test_plain_first_node_in_mixed_chain_heads_must() {
        let chain = CriteriaChain::where_field("a")
            .is("1")
            .or("b")
            .is("2")
            .and("c")
            .is("3");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.must, vec![equals("1", "a"), equals("3", "c")]);
        assert_eq!(bool_query.should, vec![equals("2", "b")]);
        assert!(bool_query.must_not.is_empty());
    }

    #[test]
    fn test_negated_first_node_heads_must_not() {
        let chain = CriteriaChain::where_field("a")
            .not()
            .is("1")
            .and("b")
            .not()
            .is("2");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.must_not, vec![equals("1", "a"), equals("2", "b")]);
        assert!(bool_query.must.is_empty());
        assert!(bool_query.should.is_empty());
    }

    #[test]
    fn test_lone_negated_node_is_forbidden() {
        let chain = CriteriaChain::where_field("a").not().is("1");
        let query = compiler().compile(&chain).unwrap();
        assert_eq!(query, BoolQuery::new().must_not(equals("1", "a")).into());
    }

    #[test]
    fn test_first_fragment_is_first_producing_node() {
        // The empty leading node does not take the first slot, so the OR node does.
        let chain = CriteriaChain::where_field("empty")
            .or("a")
            .is("1")
            .and("b")
            .is("2");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(bool_query.must, vec![equals("1", "a"), equals("2", "b")]);
        assert!(bool_query.should.is_empty());
    }

    #[test]
    fn test_buckets_keep_chain_order() {
        let chain = CriteriaChain::where_field("a")
            .is("1")
            .and("b")
            .is("2")
            .and("c")
            .not()
            .is("3")
            .and("d")
            .is("4")
            .and("e")
            .not()
            .is("5");
        let query = compiler().compile(&chain).unwrap();
        let bool_query = query.as_bool().unwrap();
        assert_eq!(
            bool_query.must,
            vec![equals("1", "a"), equals("2", "b"), equals("4", "d")]
        );
        assert_eq!(bool_query.must_not, vec![equals("3", "c"), equals("5", "e")]);
    }

    #[test]
    fn test_text_operators() {
        let cases = [
            (CriteriaEntry::Contains("york".into()), "*york*", true),
            (CriteriaEntry::StartsWith("york".into()), "york*", true),
            (CriteriaEntry::EndsWith("york".into()), "*york", true),
            (CriteriaEntry::Expression("new AND york".into()), "new AND york", false),
        ];
        for (entry, text, wildcard) in cases {
            let node = Criteria::new("city").with_entry(entry);
            let expected: Query = QueryStringQuery::new(text, "city")
                .analyze_wildcard(wildcard)
                .into();
            assert_eq!(compiler().compile_fragment(&node), Some(expected));
        }
    }

    #[test]
    fn test_comparison_operators_keep_native_values() {
        let node = Criteria::new("age").with_entry(CriteriaEntry::Less(Literal::Integer(5)));
        let Some(Query::Range(range)) = compiler().compile_fragment(&node) else {
            panic!("Expected range query");
        };
        assert_eq!(range.lower, None);
        assert_eq!(
            range.upper,
            Some(RangeBound {
                value: Literal::Integer(5),
                inclusive: false
            })
        );

        let node =
            Criteria::new("age").with_entry(CriteriaEntry::GreaterEqual(Literal::Float(1.5)));
        assert_eq!(
            compiler().compile_fragment(&node),
            Some(RangeQuery::new("age").gte(Literal::Float(1.5)).into())
        );

        let node = Criteria::new("age").with_entry(CriteriaEntry::Greater(Literal::Integer(1)));
        assert_eq!(
            compiler().compile_fragment(&node).unwrap().to_json(),
            json!({ "range": { "age": { "gt": 1 } } })
        );

        let node = Criteria::new("age").with_entry(CriteriaEntry::LessEqual(Literal::Integer(9)));
        assert_eq!(
            compiler().compile_fragment(&node).unwrap().to_json(),
            json!({ "range": { "age": { "lte": 9 } } })
        );
    }

    #[test]
    fn test_between_is_inclusive_range() {
        let chain = CriteriaChain::where_field("f").between(1, 10);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(
            fragment.to_json(),
            json!({ "range": { "f": { "gte": 1, "lte": 10 } } })
        );
    }

    #[test]
    fn test_fuzzy_uses_text_value() {
        let chain = CriteriaChain::where_field("name").fuzzy("jon");
        assert_eq!(
            compiler().compile_fragment(&chain.nodes()[0]),
            Some(FuzzyQuery::new("name", "jon").into())
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let chain = CriteriaChain::where_field("f").is_in(["x", "y"]);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        let expected_terms: Vec<Query> = vec![
            QueryStringQuery::new("x", "f").into(),
            QueryStringQuery::new("y", "f").into(),
        ];
        let bool_query = fragment.as_bool().unwrap();
        assert_eq!(bool_query.should, expected_terms);
        assert!(bool_query.must.is_empty() && bool_query.must_not.is_empty());

        let chain = CriteriaChain::where_field("f").not_in(["x", "y"]);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        let bool_query = fragment.as_bool().unwrap();
        assert_eq!(bool_query.must_not, expected_terms);
        assert!(bool_query.must.is_empty() && bool_query.should.is_empty());
    }

    #[test]
    fn test_multiple_entries_are_anded_and_nulls_skipped() {
        let chain = CriteriaChain::where_field("price")
            .greater_than(1)
            .is(Literal::Null)
            .less_than(9);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(
            fragment,
            BoolQuery::new()
                .must(RangeQuery::new("price").gt(Literal::Integer(1)))
                .must(RangeQuery::new("price").lt(Literal::Integer(9)))
                .into()
        );
    }

    #[test]
    fn test_null_entries_produce_no_fragment() {
        let node = Criteria::new("name").with_entry(CriteriaEntry::Equals(Literal::Null));
        assert_eq!(compiler().compile_fragment(&node), None);

        let node = Criteria::new("name")
            .with_entry(CriteriaEntry::Equals(Literal::Null))
            .with_entry(CriteriaEntry::Fuzzy(Literal::Null));
        assert_eq!(compiler().compile_fragment(&node), None);

        let chain = CriteriaChain::from_nodes(vec![node]);
        assert_eq!(compiler().compile(&chain), None);
    }

    #[test]
    fn test_nested_field_wraps_fragment() {
        let chain = CriteriaChain::where_field(Field::nested("addr.city", true)).is("York");
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(
            fragment,
            NestedQuery::new("addr", equals("York", "addr.city")).into()
        );

        let chain = CriteriaChain::where_field(Field::nested("addr.city", false)).is("York");
        assert_eq!(
            compiler().compile_fragment(&chain.nodes()[0]),
            Some(equals("York", "addr.city"))
        );

        let chain = CriteriaChain::where_field("addr.city").is("York");
        assert_eq!(
            compiler().compile_fragment(&chain.nodes()[0]),
            Some(equals("York", "addr.city"))
        );
    }

    #[test]
    fn test_nested_field_wraps_whole_multi_entry_fragment() {
        let chain = CriteriaChain::where_field(Field::nested("tags", true))
            .starts_with("ru")
            .ends_with("st")
            .boost(3.0);
        let Some(Query::Nested(nested)) = compiler().compile_fragment(&chain.nodes()[0]) else {
            panic!("Expected nested query");
        };
        assert_eq!(nested.path, "tags");
        assert_eq!(nested.boost, Some(3.0));
        assert_eq!(nested.query.as_bool().map(|q| q.must.len()), Some(2));
    }

    #[test]
    fn test_boost_on_single_entry() {
        let chain = CriteriaChain::where_field("name").is("foo").boost(2.5);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(fragment.boost(), Some(2.5));
    }

    #[test]
    fn test_boost_renders_as_written() {
        let chain = CriteriaChain::where_field("m").is("x").boost(1.1);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(fragment.to_json()["query_string"]["boost"], json!(1.1));
    }

    #[test]
    fn test_float_text_keeps_fraction() {
        let chain = CriteriaChain::where_field("score").is(1.0);
        assert_eq!(
            compiler().compile_fragment(&chain.nodes()[0]),
            Some(equals("1.0", "score"))
        );
    }

    #[test]
    fn test_empty_in_collection_is_empty_bool() {
        let chain = CriteriaChain::where_field("f").is_in(Vec::<Literal>::new());
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert!(fragment.as_bool().unwrap().is_empty());
    }

    #[test]
    fn test_boost_ignored_on_bool_fragment_and_nan() {
        let chain = CriteriaChain::where_field("name")
            .is("foo")
            .contains("oo")
            .boost(2.5);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert!(fragment.as_bool().is_some());
        assert_eq!(fragment.boost(), None);

        let chain = CriteriaChain::where_field("name").is("foo").boost(f32::NAN);
        let fragment = compiler().compile_fragment(&chain.nodes()[0]).unwrap();
        assert_eq!(fragment.boost(), None);
    }

    #[test]
    #[should_panic(expected = "Unknown field")]
    fn test_empty_field_name_with_entries_panics() {
        let chain = CriteriaChain::where_field("").is("foo");
        compiler().compile(&chain);
    }

    #[test]
    fn test_empty_field_name_without_entries_is_skipped() {
        let chain = CriteriaChain::where_field("").and("name").is("foo");
        assert_eq!(
            compiler().compile(&chain),
            Some(BoolQuery::new().must(equals("foo", "name")).into())
        );
    }

    #[test]
    fn test_compile_is_idempotent() {
        let chain = CriteriaChain::where_field(Field::nested("addr.city", true))
            .contains("ork")
            .boost(1.5)
            .or("age")
            .between(18, 65)
            .and("status")
            .not()
            .is_in(["closed", "archived"]);
        let first = compiler().compile(&chain);
        let second = compiler().compile(&chain);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_chain_json() {
        let chain = CriteriaChain::where_field("name")
            .is("foo")
            .boost(2.0)
            .and("age")
            .greater_than_equal(30)
            .and("status")
            .not()
            .is("closed");
        let query = compiler().compile(&chain).unwrap();
        assert_eq!(
            query.to_json(),
            json!({
                "bool": {
                    "must_not": [
                        {
                            "query_string": {
                                "query": "closed",
                                "fields": ["status"],
                                "default_operator": "and"
                            }
                        }
                    ],
                    "must": [
                        {
                            "query_string": {
                                "query": "foo",
                                "fields": ["name"],
                                "default_operator": "and",
                                "boost": 2.0
                            }
                        },
                        { "range": { "age": { "gte": 30 } } }
                    ]
                }
            })
        );
    }
}
