//! Deterministic statement generation.
//!
//! Every query lowers to exactly one SQL string with named `:column`
//! parameters. Property names resolve to columns through the relation's
//! metadata; values never appear in the SQL text. The same query always
//! produces the same statement, so generation is testable by string
//! comparison.

use std::collections::HashSet;

use ormkit_core::{
    Comparison, EntityMetadata, Error, Filter, Operation, Order, Query, Result, Value,
};

/// One generated SQL statement and the values bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    /// Bound values keyed by parameter name, `:` prefix included.
    pub parameters: Vec<(String, Value)>,
}

/// Collects bound values and keeps parameter names unique.
///
/// The first parameter for a column is named `:column`; later ones get
/// a monotonically increasing suffix, `:column1`, `:column2` and so on.
#[derive(Default)]
struct Parameters {
    entries: Vec<(String, Value)>,
    taken: HashSet<String>,
}

impl Parameters {
    fn add(&mut self, column: &str, value: Value) -> String {
        let mut name = format!(":{column}");
        let mut suffix = 0u32;
        while !self.taken.insert(name.clone()) {
            suffix += 1;
            name = format!(":{column}{suffix}");
        }
        self.entries.push((name.clone(), value));
        name
    }
}

/// Lower a query to its SQL statement.
#[allow(clippy::result_large_err)]
pub fn generate(query: &Query) -> Result<Statement> {
    match query.operation() {
        Operation::Read => generate_read(query),
        Operation::Create => generate_create(query),
        Operation::Update => generate_update(query),
        Operation::Delete => generate_delete(query),
    }
}

fn generate_read(query: &Query) -> Result<Statement> {
    let relation = query.relation();
    let mut parameters = Parameters::default();
    let mut sql = format!(
        "SELECT {} FROM {}",
        query.projection().select_columns().join(", "),
        relation.table()
    );
    if let Some(filter) = query.filter() {
        let mut clause = String::new();
        lower_filter(relation, filter, &mut parameters, &mut clause)?;
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    if !query.order().is_empty() {
        let mut terms = Vec::with_capacity(query.order().len());
        for (property, direction) in query.order() {
            let column = resolve_column(relation, property)?;
            let direction = match direction {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            terms.push(format!("{column} {direction}"));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    if let Some(limit) = query.limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(Statement {
        sql,
        parameters: parameters.entries,
    })
}

fn generate_create(query: &Query) -> Result<Statement> {
    let relation = query.relation();
    let record = query
        .record()
        .ok_or_else(|| Error::mapping(relation.entity(), "create requires a record"))?;
    let mut parameters = Parameters::default();
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for (property, value) in record {
        // The backend assigns generated object IDs itself.
        if relation
            .object_id()
            .is_some_and(|id| id.auto_generated && id.name == property)
        {
            continue;
        }
        let column = resolve_column(relation, property)?;
        let placeholder = parameters.add(column, value.clone());
        columns.push(column.to_string());
        placeholders.push(placeholder);
    }
    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", relation.table())
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            relation.table(),
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    Ok(Statement {
        sql,
        parameters: parameters.entries,
    })
}

fn generate_update(query: &Query) -> Result<Statement> {
    let relation = query.relation();
    let record = query
        .record()
        .ok_or_else(|| Error::mapping(relation.entity(), "update requires a record"))?;
    let object_id = relation.object_id().ok_or_else(|| {
        Error::mapping(
            relation.entity(),
            "cannot update entity without object ID property",
        )
    })?;

    let mut parameters = Parameters::default();
    let mut assignments = Vec::new();
    let mut id_value = None;
    for (property, value) in record {
        if property == object_id.name {
            id_value = Some(value.clone());
            continue;
        }
        let column = resolve_column(relation, property)?;
        let placeholder = parameters.add(column, value.clone());
        assignments.push(format!("{column} = {placeholder}"));
    }
    let id_value = id_value.ok_or_else(|| {
        Error::mapping(relation.entity(), "record is missing the object ID property")
    })?;
    if assignments.is_empty() {
        return Err(Error::mapping(
            relation.entity(),
            "record holds no updatable properties",
        ));
    }
    let id_placeholder = parameters.add(object_id.column, id_value);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        relation.table(),
        assignments.join(", "),
        object_id.column,
        id_placeholder
    );
    Ok(Statement {
        sql,
        parameters: parameters.entries,
    })
}

/// # Panics
///
/// Panics when the query carries neither a filter nor a record. An
/// unconditional DELETE would wipe the relation, so reaching this state
/// is a consistency failure in the caller, not a recoverable error.
fn generate_delete(query: &Query) -> Result<Statement> {
    let relation = query.relation();
    let mut parameters = Parameters::default();
    let clause = if let Some(filter) = query.filter() {
        let mut clause = String::new();
        lower_filter(relation, filter, &mut parameters, &mut clause)?;
        clause
    } else if let Some(record) = query.record() {
        let mut terms = Vec::with_capacity(record.len());
        for (property, value) in record {
            let column = resolve_column(relation, property)?;
            if value.is_null() {
                terms.push(format!("{column} IS NULL"));
            } else {
                let placeholder = parameters.add(column, value.clone());
                terms.push(format!("{column} = {placeholder}"));
            }
        }
        assert!(
            !terms.is_empty(),
            "refusing to generate an unconditional DELETE for table '{}'",
            relation.table()
        );
        terms.join(" AND ")
    } else {
        panic!(
            "refusing to generate an unconditional DELETE for table '{}'",
            relation.table()
        );
    };
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE {}", relation.table(), clause),
        parameters: parameters.entries,
    })
}

fn lower_filter(
    relation: &EntityMetadata,
    filter: &Filter,
    parameters: &mut Parameters,
    out: &mut String,
) -> Result<()> {
    match filter {
        Filter::Comparison {
            property,
            op,
            value,
        } => {
            let column = resolve_column(relation, property)?;
            match (op, value) {
                (Comparison::Equal, Value::Null) => out.push_str(&format!("{column} IS NULL")),
                (Comparison::NotEqual, Value::Null) => {
                    out.push_str(&format!("{column} IS NOT NULL"));
                }
                _ => {
                    let placeholder = parameters.add(column, value.clone());
                    out.push_str(&format!("{column} {} {placeholder}", sql_operator(*op)));
                }
            }
        }
        Filter::And(branches) => lower_group(relation, branches, " AND ", parameters, out)?,
        Filter::Or(branches) => lower_group(relation, branches, " OR ", parameters, out)?,
        Filter::Not(inner) => {
            out.push_str("NOT (");
            lower_filter(relation, inner, parameters, out)?;
            out.push(')');
        }
    }
    Ok(())
}

fn lower_group(
    relation: &EntityMetadata,
    branches: &[Filter],
    separator: &str,
    parameters: &mut Parameters,
    out: &mut String,
) -> Result<()> {
    out.push('(');
    for (i, branch) in branches.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        lower_filter(relation, branch, parameters, out)?;
    }
    out.push(')');
    Ok(())
}

fn sql_operator(op: Comparison) -> &'static str {
    match op {
        Comparison::Equal => "=",
        Comparison::NotEqual => "<>",
        Comparison::Less => "<",
        Comparison::Greater => ">",
        Comparison::LessOrEqual => "<=",
        Comparison::GreaterOrEqual => ">=",
        Comparison::Like => "LIKE",
    }
}

fn resolve_column<'a>(relation: &'a EntityMetadata, property: &str) -> Result<&'a str> {
    relation.column_for_property(property).ok_or_else(|| {
        Error::mapping(
            relation.entity(),
            format!("no property or relation named '{property}'"),
        )
    })
}
