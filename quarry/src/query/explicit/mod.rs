//! Explicit queries written in a small JPQL-like language.
//!
//! ```text
//! select m from Member m where m.username = :username and m.age > :age
//! select count(m) from Member m where m.age >= :age
//! select new MemberDto(m.id, m.username, t.name) from Member m join m.team t
//! select m from Member m left join fetch m.team order by m.username desc
//! update Member m set m.age = m.age + 1 where m.age >= :age
//! delete from Member m where m.age < :age
//! ```
//!
//! Conditions and ordering address the root entity's own fields. Joined
//! aliases are available to projections.

mod lexer;
mod parser;

use crate::common::{Order, Sort, Value};
use crate::entity::EntityMeta;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::{all, field, Filter};
use crate::query::builder::{validate_projection, validate_root_field};
use crate::query::{DeleteSpec, FieldMutation, Join, QuerySpec, Selection, Statement, UpdateSpec};
use indexmap::IndexMap;
use itertools::Itertools;
use parser::{
    parse, Ast, CompareOp, Condition, Operand, PathExpr, Projection, SelectStatement, SetExpr,
};
use std::collections::HashMap;

/// Named parameter values for an explicit query.
pub type Parameters = IndexMap<String, Value>;

/// A parsed explicit query, reusable across executions.
#[derive(Debug, Clone)]
pub struct ExplicitQuery {
    text: String,
    ast: Ast,
    parameters: Vec<String>,
}

impl ExplicitQuery {
    pub fn parse(text: &str) -> QuarryResult<ExplicitQuery> {
        let (ast, parameters) = parse(text)?;
        log::debug!("Parsed query {} with parameters {:?}", text, parameters);
        Ok(ExplicitQuery {
            text: text.to_string(),
            ast,
            parameters,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in order of first appearance.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn is_modifying(&self) -> bool {
        !matches!(self.ast, Ast::Select(_))
    }

    /// Checks the query against `meta` and binds the parameters.
    ///
    /// Every placeholder needs a value and every value needs a placeholder.
    pub fn bind(&self, meta: &EntityMeta, params: &Parameters) -> QuarryResult<Statement> {
        self.check_bindings(params)?;

        match &self.ast {
            Ast::Select(select) => {
                let binder = Binder::new(meta, &select.entity, &select.alias, params)?;
                Ok(Statement::Query(binder.select(select)?))
            }
            Ast::Update(update) => {
                let binder = Binder::new(meta, &update.entity, &update.alias, params)?;
                let filter = binder.condition(update.condition.as_ref())?;
                let mut mutations = Vec::with_capacity(update.assignments.len());
                for (target, expr) in &update.assignments {
                    let field_name = binder.root_field(target)?;
                    let mutation = match expr {
                        SetExpr::Operand(operand) => {
                            FieldMutation::set(&field_name, binder.value(operand)?)
                        }
                        SetExpr::Arithmetic {
                            path,
                            operand,
                            negate,
                        } => {
                            if binder.root_field(path)? != field_name {
                                return Err(binder.error(&format!(
                                    "arithmetic on {} must reference the assigned field {}",
                                    path.text(),
                                    target.text()
                                )));
                            }
                            let delta = binder.value(operand)?;
                            let delta = if *negate { delta.negate()? } else { delta };
                            FieldMutation::increment(&field_name, delta)
                        }
                    };
                    mutations.push(mutation);
                }
                Ok(Statement::Update(UpdateSpec::new(meta.name(), filter, mutations)))
            }
            Ast::Delete(delete) => {
                let binder = Binder::new(meta, &delete.entity, &delete.alias, params)?;
                let filter = binder.condition(delete.condition.as_ref())?;
                Ok(Statement::Delete(DeleteSpec::new(meta.name(), filter)))
            }
        }
    }

    fn check_bindings(&self, params: &Parameters) -> QuarryResult<()> {
        let missing = self
            .parameters
            .iter()
            .filter(|p| !params.contains_key(*p))
            .collect_vec();
        let unused = params
            .keys()
            .filter(|k| !self.parameters.contains(k))
            .collect_vec();

        if missing.is_empty() && unused.is_empty() {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!("missing value for {}", missing.iter().join(", ")));
        }
        if !unused.is_empty() {
            problems.push(format!("no placeholder for {}", unused.iter().join(", ")));
        }
        log::error!("Parameter binding failed for {}: {}", self.text, problems.join("; "));
        Err(QuarryError::new(
            &format!("cannot bind query {}: {}", self.text, problems.join("; ")),
            ErrorKind::ParameterBindingError,
        ))
    }
}

/// Resolves aliases and parameters of one statement.
struct Binder<'a> {
    meta: &'a EntityMeta,
    root: &'a str,
    // join alias -> relation field
    joined: HashMap<String, String>,
    params: &'a Parameters,
}

impl<'a> Binder<'a> {
    fn new(
        meta: &'a EntityMeta,
        entity: &str,
        root: &'a str,
        params: &'a Parameters,
    ) -> QuarryResult<Self> {
        if !meta.matches_name(entity) {
            log::error!("Query targets {} but repository manages {}", entity, meta.name());
            return Err(QuarryError::new(
                &format!(
                    "query targets entity {} but the repository manages {}",
                    entity,
                    meta.name()
                ),
                ErrorKind::QueryDerivationError,
            ));
        }
        Ok(Binder {
            meta,
            root,
            joined: HashMap::new(),
            params,
        })
    }

    fn error(&self, reason: &str) -> QuarryError {
        log::error!("Invalid query on {}: {}", self.meta.name(), reason);
        QuarryError::new(reason, ErrorKind::QueryDerivationError)
    }

    fn select(mut self, select: &SelectStatement) -> QuarryResult<QuerySpec> {
        let mut spec = QuerySpec::new(self.meta.name()).with_distinct(select.distinct);

        for join in &select.joins {
            if join.path.alias != self.root || join.path.fields.len() != 1 {
                return Err(self.error(&format!(
                    "join path {} must be {}.<relation>",
                    join.path.text(),
                    self.root
                )));
            }
            let relation = join.path.fields[0].clone();
            if self.meta.relation(&relation).is_none() {
                return Err(self.error(&format!(
                    "entity {} has no relation {}",
                    self.meta.name(),
                    relation
                )));
            }
            let mut bound = Join::inner(&relation)
                .with_fetch(join.fetch)
                .with_left(join.left);
            if let Some(alias) = &join.alias {
                self.joined.insert(alias.clone(), relation.clone());
                bound = bound.with_alias(alias);
            }
            spec = spec.with_join(bound);
        }

        let selection = match &select.projection {
            Projection::Entity(alias) | Projection::Count(alias) if alias != self.root => {
                return Err(self.error(&format!(
                    "select target {} is not the root alias {}",
                    alias, self.root
                )));
            }
            Projection::Entity(_) => Selection::Entities,
            Projection::Count(_) => Selection::Count,
            Projection::Paths(paths) => {
                let resolved = paths
                    .iter()
                    .map(|p| self.projection_path(p))
                    .collect::<QuarryResult<Vec<String>>>()?;
                Selection::Fields(resolved)
            }
        };
        spec = spec.with_selection(selection);

        if let Selection::Fields(paths) = spec.selection() {
            for path in paths {
                validate_projection(self.meta, &spec, path)?;
            }
        }

        spec = spec.with_filter(self.condition(select.condition.as_ref())?);

        let orders = select
            .order
            .iter()
            .map(|(path, direction)| Ok(Order::new(&self.root_field(path)?, *direction)))
            .collect::<QuarryResult<Vec<Order>>>()?;
        Ok(spec.with_sort(Sort::from_orders(orders)))
    }

    /// A path on the root alias, as a plain field name.
    fn root_field(&self, path: &PathExpr) -> QuarryResult<String> {
        if path.alias != self.root {
            return Err(self.error(&format!(
                "{} must address a field of {}; conditions and ordering on joined aliases are not supported",
                path.text(),
                self.root
            )));
        }
        if path.fields.is_empty() {
            return Err(self.error(&format!("{} does not name a field", path.text())));
        }
        let field_name = path.fields.join(".");
        validate_root_field(self.meta, &field_name)?;
        Ok(field_name)
    }

    fn projection_path(&self, path: &PathExpr) -> QuarryResult<String> {
        if path.fields.is_empty() {
            return Err(self.error(&format!(
                "projection {} must name a field",
                path.text()
            )));
        }
        if path.alias == self.root {
            return Ok(path.fields.join("."));
        }
        match self.joined.get(&path.alias) {
            Some(relation) => Ok(format!("{}.{}", relation, path.fields.join("."))),
            None => Err(self.error(&format!("unknown alias {}", path.alias))),
        }
    }

    fn value(&self, operand: &Operand) -> QuarryResult<Value> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Param(name) => self.params.get(name).cloned().ok_or_else(|| {
                QuarryError::new(
                    &format!("missing value for parameter {}", name),
                    ErrorKind::ParameterBindingError,
                )
            }),
        }
    }

    fn condition(&self, condition: Option<&Condition>) -> QuarryResult<Filter> {
        match condition {
            None => Ok(all()),
            Some(condition) => self.filter(condition),
        }
    }

    fn filter(&self, condition: &Condition) -> QuarryResult<Filter> {
        let filter = match condition {
            Condition::Compare { path, op, operand } => {
                let name = self.root_field(path)?;
                let value = self.value(operand)?;
                match op {
                    CompareOp::Eq if value.is_null() => field(&name).is_null(),
                    CompareOp::Eq => field(&name).eq(value),
                    CompareOp::Ne if value.is_null() => field(&name).is_not_null(),
                    CompareOp::Ne => field(&name).ne(value),
                    CompareOp::Gt => field(&name).gt(value),
                    CompareOp::Gte => field(&name).gte(value),
                    CompareOp::Lt => field(&name).lt(value),
                    CompareOp::Lte => field(&name).lte(value),
                }
            }
            Condition::Between {
                path,
                lower,
                upper,
                negated,
            } => {
                let name = self.root_field(path)?;
                let between = field(&name).between(self.value(lower)?, self.value(upper)?);
                if *negated {
                    between.not()
                } else {
                    between
                }
            }
            Condition::In {
                path,
                operand,
                negated,
            } => {
                let name = self.root_field(path)?;
                let values = match self.value(operand)? {
                    Value::Array(values) => values,
                    other => {
                        log::error!("In-clause on {} needs a list, got {}", name, other);
                        return Err(QuarryError::new(
                            &format!(
                                "value for in-clause on {} must be a list, got {}",
                                name,
                                other.type_name()
                            ),
                            ErrorKind::ParameterBindingError,
                        ));
                    }
                };
                if *negated {
                    field(&name).not_in(values)
                } else {
                    field(&name).in_list(values)
                }
            }
            Condition::Null { path, negated } => {
                let name = self.root_field(path)?;
                if *negated {
                    field(&name).is_not_null()
                } else {
                    field(&name).is_null()
                }
            }
            Condition::And(left, right) => self.filter(left)?.and(self.filter(right)?),
            Condition::Or(left, right) => self.filter(left)?.or(self.filter(right)?),
            Condition::Not(inner) => self.filter(inner)?.not(),
        };
        Ok(filter)
    }
}
