//! Latest-version view: a composable query over the rows whose version is the
//! maximum for their id.
//!
//! The base table is joined against the per-id `MAX(version)` grouping, so every
//! id contributes at most one row no matter which predicates are added. Joins to
//! other entities go through version tokens, which are unique, so they cannot
//! fan a row out either.

use crate::core::descriptor::{EntityDescriptor, is_identifier, is_reserved};
use crate::core::error::ScdError;
use crate::versioning::entity::Entity;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

/// Alias of the grouping subquery inside the generated SQL.
const LATEST_ALIAS: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    alias: String,
    table: String,
    token: String,
    columns: Vec<String>,
    via_column: String,
}

#[derive(Debug, Clone)]
struct Predicate {
    alias: String,
    column: String,
    cmp: Cmp,
    value: Value,
}

#[derive(Debug, Clone)]
pub struct LatestView<'d> {
    desc: &'d EntityDescriptor,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    order: Vec<(String, String, bool)>,
    limit: Option<u32>,
}

impl<'d> LatestView<'d> {
    pub fn new(desc: &'d EntityDescriptor) -> Self {
        Self {
            desc,
            joins: Vec::new(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// The bare grouping fragment: `id, MAX(version) AS max_version` per id.
    pub fn subquery_sql(desc: &EntityDescriptor) -> String {
        format!(
            "SELECT {id}, MAX({version}) AS max_version FROM {table} GROUP BY {id}",
            id = desc.identity,
            version = desc.version,
            table = desc.table
        )
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        self.desc
    }

    /// Predicate on a column of the base entity.
    pub fn filter(mut self, column: &str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            alias: self.desc.table.clone(),
            column: column.to_string(),
            cmp,
            value: value.into(),
        });
        self
    }

    pub fn filter_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Cmp::Eq, value)
    }

    /// Joins the exact row version referenced by `column` (a token-valued field)
    /// under `alias`.
    pub fn join_reference(mut self, column: &str, target: &EntityDescriptor, alias: &str) -> Self {
        self.joins.push(Join {
            alias: alias.to_string(),
            table: target.table.clone(),
            token: target.token.clone(),
            columns: target.columns().iter().map(|c| c.to_string()).collect(),
            via_column: column.to_string(),
        });
        self
    }

    /// Predicate on a column of a joined entity.
    pub fn filter_joined(
        mut self,
        alias: &str,
        column: &str,
        cmp: Cmp,
        value: impl Into<Value>,
    ) -> Self {
        self.predicates.push(Predicate {
            alias: alias.to_string(),
            column: column.to_string(),
            cmp,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order
            .push((self.desc.table.clone(), column.to_string(), descending));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    fn check_base_column(&self, column: &str) -> Result<(), ScdError> {
        if self.desc.columns().contains(&column) {
            Ok(())
        } else {
            Err(ScdError::ValidationError(format!(
                "{} has no column '{}'",
                self.desc.name, column
            )))
        }
    }

    fn check_column(&self, alias: &str, column: &str) -> Result<(), ScdError> {
        if alias == self.desc.table {
            return self.check_base_column(column);
        }
        let join = self
            .joins
            .iter()
            .find(|j| j.alias == alias)
            .ok_or_else(|| {
                ScdError::ValidationError(format!(
                    "No join aliased '{}' on the {} view",
                    alias, self.desc.name
                ))
            })?;
        if join.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(ScdError::ValidationError(format!(
                "Joined table '{}' has no column '{}'",
                join.table, column
            )))
        }
    }

    /// Renders the query and its positional parameters.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>), ScdError> {
        let desc = self.desc;
        desc.validate()?;
        let base = desc.table.as_str();

        let select: Vec<String> = desc
            .columns()
            .iter()
            .map(|c| format!("{}.{}", base, c))
            .collect();

        let mut sql = format!(
            "SELECT {select}\nFROM {base}\nJOIN ({sub}) AS {latest}\n  ON {base}.{id} = {latest}.{id} AND {base}.{version} = {latest}.max_version",
            select = select.join(", "),
            base = base,
            sub = Self::subquery_sql(desc),
            latest = LATEST_ALIAS,
            id = desc.identity,
            version = desc.version,
        );

        let mut aliases = vec![base.to_string(), LATEST_ALIAS.to_string()];
        for join in &self.joins {
            if !is_identifier(&join.alias)
                || is_reserved(&join.alias)
                || aliases.contains(&join.alias)
            {
                return Err(ScdError::ValidationError(format!(
                    "Join alias '{}' is invalid or already in use",
                    join.alias
                )));
            }
            self.check_base_column(&join.via_column)?;
            sql.push_str(&format!(
                "\nJOIN {table} AS {alias} ON {base}.{via} = {alias}.{token}",
                table = join.table,
                alias = join.alias,
                base = base,
                via = join.via_column,
                token = join.token,
            ));
            aliases.push(join.alias.clone());
        }

        let mut params = Vec::with_capacity(self.predicates.len());
        if !self.predicates.is_empty() {
            let mut clauses = Vec::with_capacity(self.predicates.len());
            for p in &self.predicates {
                self.check_column(&p.alias, &p.column)?;
                params.push(p.value.clone());
                clauses.push(format!(
                    "{}.{} {} ?{}",
                    p.alias,
                    p.column,
                    p.cmp.sql(),
                    params.len()
                ));
            }
            sql.push_str("\nWHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut order = Vec::new();
        for (alias, column, descending) in &self.order {
            self.check_column(alias, column)?;
            order.push(format!(
                "{}.{} {}",
                alias,
                column,
                if *descending { "DESC" } else { "ASC" }
            ));
        }
        // Stable output order when the caller asked for none.
        order.push(format!("{}.{} ASC", base, desc.identity));
        sql.push_str("\nORDER BY ");
        sql.push_str(&order.join(", "));

        if let Some(n) = self.limit {
            sql.push_str(&format!("\nLIMIT {}", n));
        }

        Ok((sql, params))
    }

    pub fn fetch<T: Entity>(&self, conn: &Connection) -> Result<Vec<T>, ScdError> {
        let (sql, params) = self.to_sql()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| T::from_row(self.desc, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self, conn: &Connection) -> Result<i64, ScdError> {
        let (sql, params) = self.to_sql()?;
        let wrapped = format!("SELECT COUNT(*) FROM ({})", sql);
        Ok(conn.query_row(&wrapped, params_from_iter(params.iter()), |row| row.get(0))?)
    }
}
