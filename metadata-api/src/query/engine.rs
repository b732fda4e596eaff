//! `AttributeQueryEngine` (§4.10): turns a validated `Query` into a
//! parameterized SQL statement against the indexed tables. Identifiers are
//! always taken from the whitelisted physical schema, never interpolated
//! from the request; values are always bound.

use super::cache::AttributeValueCache;
use super::{AggFunction, Operation, OrderDirection, Query};
use crate::error::QueryError;
use crate::metadata_service::MetadataService;
use crate::schema::{AttributeSchema, DataType, EntitySchema};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;

pub struct AttributeQueryEngine {
    pool: PgPool,
    metadata: std::sync::Arc<MetadataService>,
    cache: AttributeValueCache,
    max_rows: u32,
    query_timeout: Duration,
}

impl AttributeQueryEngine {
    pub fn new(
        pool: PgPool,
        metadata: std::sync::Arc<MetadataService>,
        max_rows: u32,
        query_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            metadata,
            cache: AttributeValueCache::new(),
            max_rows,
            query_timeout,
        }
    }

    pub async fn run(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
        query: Query,
    ) -> Result<Vec<Map<String, Value>>, QueryError> {
        let entity_schema = crate::schema::platform(platform)
            .and_then(|p| p.network(network))
            .and_then(|n| n.entity(entity))
            .ok_or_else(|| {
                QueryError::Metadata(crate::error::MetadataError::UnknownPath(entity.to_string()))
            })?;

        let fields = self.resolve_fields(platform, network, entity, &query)?;
        let mut sql = self.build_sql(platform, network, entity, entity_schema, &fields, &query)?;

        let fut = sql.build().fetch_all(&self.pool);
        let rows = tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| QueryError::Timeout)??;

        Ok(rows.iter().map(|r| row_to_json(r, &fields)).collect())
    }

    fn resolve_fields(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
        query: &Query,
    ) -> Result<Vec<AttributeSchema>, QueryError> {
        let names: Vec<&str> = if query.fields.is_empty() {
            let visible = self.metadata.list_attributes(platform, network, entity)?;
            return Ok(visible
                .iter()
                .filter_map(|a| {
                    crate::schema::platform(platform)
                        .and_then(|p| p.network(network))
                        .and_then(|n| n.entity(entity))
                        .and_then(|e| e.attribute(&a.name))
                        .cloned()
                })
                .collect());
        } else {
            query.fields.iter().map(String::as_str).collect()
        };
        names
            .into_iter()
            .map(|name| {
                self.metadata
                    .resolve_attribute_for_query(platform, network, entity, name)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(QueryError::from)
    }

    /// Resolves `name` via `MetadataService` (§4.10 step 1: predicates,
    /// aggregations, ordering, and limits are all subject to the same
    /// visibility cascade as the selected columns) rather than the bare
    /// physical schema, so a query cannot smuggle a reference to a hidden
    /// attribute into a clause other than SELECT.
    fn resolve_clause_attribute(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
        name: &str,
    ) -> Result<AttributeSchema, QueryError> {
        self.metadata
            .resolve_attribute_for_query(platform, network, entity, name)
            .map_err(QueryError::from)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_sql<'q>(
        &self,
        platform: &str,
        network: &str,
        entity_name: &str,
        entity: &'static EntitySchema,
        fields: &'q [AttributeSchema],
        query: &'q Query,
    ) -> Result<QueryBuilder<'q, Postgres>, QueryError> {
        let mut qb = QueryBuilder::new("SELECT ");
        if query.aggregation.is_empty() {
            let cols: Vec<&str> = fields.iter().map(|f| f.column).collect();
            qb.push(cols.join(", "));
        } else {
            let agg_cols: Result<Vec<String>, QueryError> = query
                .aggregation
                .iter()
                .map(|agg| {
                    let attr =
                        self.resolve_clause_attribute(platform, network, entity_name, &agg.field)?;
                    Ok(format!("{}({}) AS {}", agg_fn_sql(agg.function), attr.column, attr.column))
                })
                .collect();
            qb.push(agg_cols?.join(", "));
        }
        qb.push(format!(" FROM {}", entity.table));

        if !query.predicates.is_empty() {
            qb.push(" WHERE ");
            let mut separated = qb.separated(" AND ");
            for pred in &query.predicates {
                let attr =
                    self.resolve_clause_attribute(platform, network, entity_name, &pred.field)?;
                push_predicate(&mut separated, &attr, pred)?;
            }
        }

        if !query.order_by.is_empty() {
            qb.push(" ORDER BY ");
            let mut first = true;
            for ord in &query.order_by {
                let attr =
                    self.resolve_clause_attribute(platform, network, entity_name, &ord.field)?;
                if !first {
                    qb.push(", ");
                }
                first = false;
                qb.push(attr.column);
                qb.push(match ord.direction {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
            }
        }

        let limit = query.limit.unwrap_or(self.max_rows).min(self.max_rows);
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        Ok(qb)
    }

    /// Serves `attributeValues` (§4.10): cache-first for cardinality-safe
    /// attributes, falling back to a bounded `LIKE` query; always a `LIKE`
    /// query for attributes not declared cardinality-safe.
    pub async fn attribute_values(
        &self,
        platform: &str,
        network: &str,
        entity: &str,
        attribute: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, QueryError> {
        let attr = self
            .metadata
            .resolve_attribute_for_query(platform, network, entity, attribute)?;
        let entity_schema = crate::schema::platform(platform)
            .and_then(|p| p.network(network))
            .and_then(|n| n.entity(entity))
            .expect("resolved above");

        if attr.cardinality_safe && prefix.is_none() {
            let cache_key = format!("{platform}/{network}/{entity}/{attribute}");
            if let Some(values) = self.cache.get(&cache_key) {
                if !self.cache.is_stale(&cache_key) {
                    return Ok(values);
                }
                if self.cache.begin_refresh(&cache_key, Duration::from_secs(300)) {
                    let fresh = self.load_distinct_values(entity_schema, &attr, None).await?;
                    self.cache
                        .finish_refresh(&cache_key, fresh.clone(), Duration::from_secs(300));
                    return Ok(fresh);
                }
                return Ok(values);
            }
            if self.cache.begin_refresh(&cache_key, Duration::from_secs(300)) {
                let fresh = self.load_distinct_values(entity_schema, &attr, None).await?;
                self.cache
                    .finish_refresh(&cache_key, fresh.clone(), Duration::from_secs(300));
                return Ok(fresh);
            }
        }

        self.load_distinct_values(entity_schema, &attr, prefix).await
    }

    async fn load_distinct_values(
        &self,
        entity: &EntitySchema,
        attr: &AttributeSchema,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, QueryError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT DISTINCT {}::text AS v FROM {}",
            attr.column, entity.table
        ));
        if let Some(prefix) = prefix {
            qb.push(format!(" WHERE {}::text LIKE ", attr.column));
            qb.push_bind(format!("{prefix}%"));
        }
        qb.push(" LIMIT ");
        qb.push_bind(self.max_rows as i64);

        let fut = qb.build().fetch_all(&self.pool);
        let rows = tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| QueryError::Timeout)??;
        Ok(rows.iter().map(|r| r.get::<String, _>("v")).collect())
    }
}

fn agg_fn_sql(f: AggFunction) -> &'static str {
    match f {
        AggFunction::Count => "COUNT",
        AggFunction::Sum => "SUM",
        AggFunction::Avg => "AVG",
        AggFunction::Min => "MIN",
        AggFunction::Max => "MAX",
    }
}

fn push_predicate<'q>(
    separated: &mut sqlx::query_builder::Separated<'_, 'q, Postgres, &'static str>,
    attr: &AttributeSchema,
    pred: &super::Predicate,
) -> Result<(), QueryError> {
    match pred.operation {
        Operation::IsNull => {
            let op = if pred.inverse { "IS NOT NULL" } else { "IS NULL" };
            separated.push(format!("{} {}", attr.column, op));
        }
        Operation::In => {
            if pred.set.is_empty() {
                return Err(QueryError::QueryValidationError(format!(
                    "predicate on {} requires a non-empty set for `in`",
                    pred.field
                )));
            }
            let not = if pred.inverse { "NOT " } else { "" };
            separated.push(format!("{} {}IN (", attr.column, not));
            let mut first = true;
            for v in &pred.set {
                if !first {
                    separated.push_unseparated(", ");
                }
                first = false;
                bind_value(separated, attr.data_type, v)?;
            }
            separated.push_unseparated(")");
        }
        Operation::Like => {
            let value = pred
                .set
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    QueryError::QueryValidationError(format!("`like` on {} needs one string value", pred.field))
                })?;
            let op = if pred.inverse { "NOT LIKE" } else { "LIKE" };
            separated.push(format!("{} {} ", attr.column, op));
            separated.push_bind_unseparated(value.to_string());
        }
        op => {
            let value = pred.set.first().ok_or_else(|| {
                QueryError::QueryValidationError(format!("predicate on {} needs one value", pred.field))
            })?;
            let sql_op = match (op, pred.inverse) {
                (Operation::Eq, false) => "=",
                (Operation::Eq, true) => "!=",
                (Operation::Ne, false) => "!=",
                (Operation::Ne, true) => "=",
                (Operation::Gt, false) => ">",
                (Operation::Gt, true) => "<=",
                (Operation::Lt, false) => "<",
                (Operation::Lt, true) => ">=",
                _ => unreachable!("handled above"),
            };
            separated.push(format!("{} {} ", attr.column, sql_op));
            bind_value_unseparated(separated, attr.data_type, value)?;
        }
    }
    Ok(())
}

fn bind_value<'q>(
    separated: &mut sqlx::query_builder::Separated<'_, 'q, Postgres, &'static str>,
    data_type: DataType,
    value: &Value,
) -> Result<(), QueryError> {
    match typed_value(data_type, value)? {
        TypedValue::Int(v) => separated.push_bind_unseparated(v),
        TypedValue::Decimal(v) => separated.push_bind_unseparated(v),
        TypedValue::Bool(v) => separated.push_bind_unseparated(v),
        TypedValue::Text(v) => separated.push_bind_unseparated(v),
    };
    Ok(())
}

fn bind_value_unseparated<'q>(
    separated: &mut sqlx::query_builder::Separated<'_, 'q, Postgres, &'static str>,
    data_type: DataType,
    value: &Value,
) -> Result<(), QueryError> {
    bind_value(separated, data_type, value)
}

enum TypedValue {
    Int(i64),
    Decimal(f64),
    Bool(bool),
    Text(String),
}

fn typed_value(data_type: DataType, value: &Value) -> Result<TypedValue, QueryError> {
    match data_type {
        DataType::Int => value
            .as_i64()
            .map(TypedValue::Int)
            .ok_or_else(|| QueryError::QueryValidationError("expected an integer".to_string())),
        DataType::Decimal => value
            .as_f64()
            .map(TypedValue::Decimal)
            .ok_or_else(|| QueryError::QueryValidationError("expected a number".to_string())),
        DataType::Boolean => value
            .as_bool()
            .map(TypedValue::Bool)
            .ok_or_else(|| QueryError::QueryValidationError("expected a boolean".to_string())),
        DataType::String | DataType::Hash | DataType::AccountAddress | DataType::DateTime => value
            .as_str()
            .map(|s| TypedValue::Text(s.to_string()))
            .ok_or_else(|| QueryError::QueryValidationError("expected a string".to_string())),
    }
}

fn row_to_json(row: &PgRow, fields: &[AttributeSchema]) -> Map<String, Value> {
    let mut map = Map::new();
    for field in fields {
        let value = match field.data_type {
            DataType::Int => row
                .try_get::<i64, _>(field.column)
                .map(Value::from)
                .unwrap_or(Value::Null),
            DataType::Boolean => row
                .try_get::<bool, _>(field.column)
                .map(Value::from)
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<String, _>(field.column)
                .map(Value::from)
                .unwrap_or(Value::Null),
        };
        map.insert(field.name.to_string(), value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Aggregation, OrderBy};

    fn operations() -> &'static EntitySchema {
        crate::schema::platform("tezos")
            .unwrap()
            .network("mainnet")
            .unwrap()
            .entity("operations")
            .unwrap()
    }

    /// Makes `tezos/mainnet/operations` and the given attributes visible, so
    /// `build_sql`'s `MetadataService`-backed resolution succeeds the same
    /// way it would against a real deployment's override config.
    fn visible_tree(attributes: &[&str]) -> crate::overrides::OverrideTree {
        use crate::overrides::{AttributeOverride, EntityOverride, NetworkOverride, PlatformOverride};
        let mut entity = EntityOverride {
            visible: Some(true),
            ..Default::default()
        };
        for attr in attributes {
            entity.attributes.insert(
                attr.to_string(),
                AttributeOverride {
                    visible: Some(true),
                    ..Default::default()
                },
            );
        }
        let mut network = NetworkOverride {
            visible: Some(true),
            ..Default::default()
        };
        network.entities.insert("operations".to_string(), entity);
        let mut platform = PlatformOverride {
            visible: Some(true),
            ..Default::default()
        };
        platform.networks.insert("mainnet".to_string(), network);
        let mut tree = crate::overrides::OverrideTree::default();
        tree.insert("tezos".to_string(), platform);
        tree
    }

    fn bare_engine(attributes: &[&str]) -> AttributeQueryEngine {
        // Never connected; only `build_sql` (pure) is exercised in these tests.
        let pool = sqlx::Pool::connect_lazy("postgres://localhost/unused").unwrap();
        AttributeQueryEngine::new(
            pool,
            std::sync::Arc::new(MetadataService::new(visible_tree(attributes))),
            1000,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn builds_select_with_predicate_and_order_and_limit() {
        let engine = bare_engine(&["source", "kind", "fee"]);
        let entity = operations();
        let fields = vec![entity.attribute("source").unwrap().clone()];
        let query = Query {
            fields: vec!["source".to_string()],
            predicates: vec![super::super::Predicate {
                field: "kind".to_string(),
                operation: Operation::Eq,
                set: vec![Value::String("transaction".to_string())],
                inverse: false,
            }],
            aggregation: vec![],
            order_by: vec![OrderBy {
                field: "fee".to_string(),
                direction: OrderDirection::Desc,
            }],
            limit: Some(10),
        };
        let qb = engine
            .build_sql("tezos", "mainnet", "operations", entity, &fields, &query)
            .unwrap();
        let sql = qb.sql();
        assert!(sql.contains("SELECT source FROM transactions"));
        assert!(sql.contains("WHERE kind = "));
        assert!(sql.contains("ORDER BY fee DESC"));
        assert!(sql.contains("LIMIT"));
    }

    #[tokio::test]
    async fn aggregation_query_uses_function_wrapped_columns() {
        let engine = bare_engine(&["fee"]);
        let entity = operations();
        let query = Query {
            aggregation: vec![Aggregation {
                field: "fee".to_string(),
                function: AggFunction::Avg,
            }],
            limit: Some(1),
            ..Default::default()
        };
        let qb = engine
            .build_sql("tezos", "mainnet", "operations", entity, &[], &query)
            .unwrap();
        assert!(qb.sql().contains("AVG(fee)"));
    }

    #[tokio::test]
    async fn unknown_predicate_field_is_rejected() {
        let engine = bare_engine(&[]);
        let entity = operations();
        let query = Query {
            predicates: vec![super::super::Predicate {
                field: "does_not_exist".to_string(),
                operation: Operation::Eq,
                set: vec![Value::String("x".to_string())],
                inverse: false,
            }],
            ..Default::default()
        };
        assert!(engine
            .build_sql("tezos", "mainnet", "operations", entity, &[], &query)
            .is_err());
    }

    #[tokio::test]
    async fn hidden_predicate_field_is_rejected() {
        // "fee" exists physically but isn't in the visible-attributes list,
        // so it must 404-equivalent the same way an unknown field does (§4.10).
        let engine = bare_engine(&["kind"]);
        let entity = operations();
        let query = Query {
            predicates: vec![super::super::Predicate {
                field: "fee".to_string(),
                operation: Operation::Gt,
                set: vec![Value::from(0)],
                inverse: false,
            }],
            ..Default::default()
        };
        let err = match engine.build_sql("tezos", "mainnet", "operations", entity, &[], &query) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(
            err,
            QueryError::Metadata(crate::error::MetadataError::HiddenPath(_))
        ));
    }

    #[tokio::test]
    async fn hidden_aggregation_field_is_rejected() {
        let engine = bare_engine(&["kind"]);
        let entity = operations();
        let query = Query {
            aggregation: vec![Aggregation {
                field: "fee".to_string(),
                function: AggFunction::Sum,
            }],
            ..Default::default()
        };
        let err = match engine.build_sql("tezos", "mainnet", "operations", entity, &[], &query) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(
            err,
            QueryError::Metadata(crate::error::MetadataError::HiddenPath(_))
        ));
    }

    #[tokio::test]
    async fn hidden_order_by_field_is_rejected() {
        let engine = bare_engine(&["kind"]);
        let entity = operations();
        let query = Query {
            order_by: vec![OrderBy {
                field: "fee".to_string(),
                direction: OrderDirection::Asc,
            }],
            ..Default::default()
        };
        let err = match engine.build_sql("tezos", "mainnet", "operations", entity, &[], &query) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(
            err,
            QueryError::Metadata(crate::error::MetadataError::HiddenPath(_))
        ));
    }
}
