use crate::common::{Order, Sort, SortOrder, Value};
use crate::entity::{Entity, EntityMeta};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::{all, field, or, Filter};
use crate::mapper::ResultShape;
use crate::query::{QuerySpec, Selection};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static METHOD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("valid method name pattern"));

static LIMITING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(first|top)(\d*)$").expect("valid limiting pattern"));

/// What a derived method does with the rows it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Find,
    Count,
    Exists,
    Delete,
}

/// Comparison named by the tail of a predicate part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    True,
    False,
}

impl Operator {
    fn from_keyword(keyword: &str) -> Option<Operator> {
        let operator = match keyword {
            "" | "is" | "equals" | "is_equal_to" => Operator::Equals,
            "not" | "is_not" | "not_equals" => Operator::NotEquals,
            "greater_than" | "is_greater_than" | "after" | "is_after" => Operator::GreaterThan,
            "greater_than_equal" | "is_greater_than_equal" => Operator::GreaterThanEqual,
            "less_than" | "is_less_than" | "before" | "is_before" => Operator::LessThan,
            "less_than_equal" | "is_less_than_equal" => Operator::LessThanEqual,
            "between" | "is_between" => Operator::Between,
            "in" | "is_in" => Operator::In,
            "not_in" | "is_not_in" => Operator::NotIn,
            "null" | "is_null" => Operator::IsNull,
            "not_null" | "is_not_null" => Operator::IsNotNull,
            "true" | "is_true" => Operator::True,
            "false" | "is_false" => Operator::False,
            _ => return None,
        };
        Some(operator)
    }

    /// Number of method arguments the operator consumes.
    pub fn arity(&self) -> usize {
        match self {
            Operator::Between => 2,
            Operator::IsNull | Operator::IsNotNull | Operator::True | Operator::False => 0,
            _ => 1,
        }
    }
}

/// One `field + operator` clause of a derived predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    field: String,
    operator: Operator,
}

impl Part {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    fn to_filter(&self, args: &[Value]) -> QuarryResult<Filter> {
        let field_name = self.field.as_str();
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        let filter = match self.operator {
            Operator::Equals if arg(0).is_null() => field(field_name).is_null(),
            Operator::Equals => field(field_name).eq(arg(0)),
            Operator::NotEquals if arg(0).is_null() => field(field_name).is_not_null(),
            Operator::NotEquals => field(field_name).ne(arg(0)),
            Operator::GreaterThan => field(field_name).gt(arg(0)),
            Operator::GreaterThanEqual => field(field_name).gte(arg(0)),
            Operator::LessThan => field(field_name).lt(arg(0)),
            Operator::LessThanEqual => field(field_name).lte(arg(0)),
            Operator::Between => field(field_name).between(arg(0), arg(1)),
            Operator::In | Operator::NotIn => {
                let values = match arg(0) {
                    Value::Array(values) => values,
                    other => {
                        log::error!("In-clause on {} needs a list, got {}", field_name, other);
                        return Err(QuarryError::new(
                            &format!(
                                "argument for {} must be a list, got {}",
                                field_name,
                                other.type_name()
                            ),
                            ErrorKind::ParameterBindingError,
                        ));
                    }
                };
                if self.operator == Operator::In {
                    field(field_name).in_list(values)
                } else {
                    field(field_name).not_in(values)
                }
            }
            Operator::IsNull => field(field_name).is_null(),
            Operator::IsNotNull => field(field_name).is_not_null(),
            Operator::True => field(field_name).eq(true),
            Operator::False => field(field_name).eq(false),
        };
        Ok(filter)
    }
}

/// A query parsed from a repository method name.
///
/// Names follow `<subject>[_distinct][_first|_topN][_words]_by_<predicate>[_order_by_<sort>]`:
///
/// - subject: `find`, `read`, `get`, `query`, `search`, `stream`, `count`, `exists`, `delete`, `remove`
/// - predicate parts are `<field>[_<operator>]` joined by `_and_` / `_or_`, AND binding tighter
/// - sort keys are `<field>[_asc|_desc]`, repeatable
///
/// ```rust,ignore
/// let query = DerivedQuery::parse::<Member>("find_by_username_and_age_greater_than")?;
/// let spec = query.bind(&["member1".into(), 15.into()])?;
/// ```
#[derive(Debug, Clone)]
pub struct DerivedQuery {
    name: String,
    entity: &'static str,
    subject: Subject,
    distinct: bool,
    limit: Option<u64>,
    predicate: Vec<Vec<Part>>,
    sort: Sort,
}

impl DerivedQuery {
    pub fn parse<T: Entity>(name: &str) -> QuarryResult<DerivedQuery> {
        DerivedQuery::parse_with(&T::meta(), name)
    }

    pub fn parse_with(meta: &EntityMeta, name: &str) -> QuarryResult<DerivedQuery> {
        if !METHOD_NAME.is_match(name) {
            return Err(derivation_error(name, name, "is not a snake_case method name"));
        }

        let tokens: Vec<&str> = name.split('_').collect();
        let subject = match tokens[0] {
            "find" | "read" | "get" | "query" | "search" | "stream" => Subject::Find,
            "count" => Subject::Count,
            "exists" => Subject::Exists,
            "delete" | "remove" => Subject::Delete,
            other => return Err(derivation_error(name, other, "is not a query subject")),
        };

        let order_at = (1..tokens.len().saturating_sub(1))
            .find(|&i| tokens[i] == "order" && tokens[i + 1] == "by");
        let by_at = (1..tokens.len())
            .find(|&i| tokens[i] == "by" && tokens[i - 1] != "order");
        let subject_end = by_at.or(order_at).unwrap_or(tokens.len());

        let mut distinct = false;
        let mut limit = None;
        for token in &tokens[1..subject_end] {
            if *token == "distinct" {
                distinct = true;
            } else if let Some(captures) = LIMITING.captures(token) {
                let digits = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                let count = if digits.is_empty() { 1 } else { digits.parse::<u64>()? };
                if count == 0 {
                    return Err(derivation_error(name, token, "must limit to at least one row"));
                }
                limit = Some(count);
            }
        }

        let predicate = match by_at {
            Some(by) => {
                let end = order_at.filter(|&o| o > by).unwrap_or(tokens.len());
                let criteria = &tokens[by + 1..end];
                if criteria.is_empty() {
                    return Err(derivation_error(name, "by", "has no criteria"));
                }
                parse_predicate(meta, name, criteria)?
            }
            None => Vec::new(),
        };

        let sort = match order_at {
            Some(order) => parse_sort(meta, name, &tokens[order + 2..])?,
            None => Sort::unsorted(),
        };

        log::debug!("Derived {} on {} from {}", subject_name(subject), meta.name(), name);
        Ok(DerivedQuery {
            name: name.to_string(),
            entity: meta.name(),
            subject,
            distinct,
            limit,
            predicate,
            sort,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// OR-groups of AND-ed parts.
    pub fn predicate(&self) -> &[Vec<Part>] {
        &self.predicate
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Number of arguments the method expects.
    pub fn arity(&self) -> usize {
        self.predicate
            .iter()
            .flatten()
            .map(|part| part.operator.arity())
            .sum()
    }

    /// The natural return shape for the method.
    pub fn result_shape(&self) -> ResultShape {
        match self.subject {
            Subject::Count => ResultShape::Count,
            Subject::Exists => ResultShape::Exists,
            Subject::Delete => ResultShape::Affected,
            Subject::Find if self.limit == Some(1) => ResultShape::Optional,
            Subject::Find => ResultShape::List,
        }
    }

    /// Binds positional arguments, in predicate order, into a query.
    pub fn bind(&self, args: &[Value]) -> QuarryResult<QuerySpec> {
        let arity = self.arity();
        if args.len() != arity {
            log::error!(
                "Method {} expects {} arguments, got {}",
                self.name,
                arity,
                args.len()
            );
            return Err(QuarryError::new(
                &format!(
                    "method {} expects {} argument(s), got {}",
                    self.name,
                    arity,
                    args.len()
                ),
                ErrorKind::ParameterBindingError,
            ));
        }

        let mut position = 0;
        let mut groups = Vec::with_capacity(self.predicate.len());
        for group in &self.predicate {
            let mut filter = all();
            for part in group {
                let consumed = part.operator.arity();
                let part_filter = part.to_filter(&args[position..position + consumed])?;
                position += consumed;
                filter = filter.and(part_filter);
            }
            groups.push(filter);
        }

        let filter = match groups.len() {
            0 => all(),
            1 => groups.remove(0),
            _ => or(groups),
        };

        let mut spec = QuerySpec::new(self.entity)
            .with_filter(filter)
            .with_sort(self.sort.clone())
            .with_distinct(self.distinct)
            .with_limit(self.limit);

        spec = match self.subject {
            Subject::Count => spec.with_selection(Selection::Count),
            Subject::Exists => spec.with_limit(Some(1)),
            _ => spec,
        };
        Ok(spec)
    }
}

impl Display for DerivedQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let predicate = self
            .predicate
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|part| format!("{} {:?}", part.field, part.operator))
                    .join(" and ")
            })
            .join(" or ");
        write!(f, "{} {} where {}", subject_name(self.subject), self.entity, predicate)
    }
}

fn subject_name(subject: Subject) -> &'static str {
    match subject {
        Subject::Find => "find",
        Subject::Count => "count",
        Subject::Exists => "exists",
        Subject::Delete => "delete",
    }
}

fn derivation_error(name: &str, fragment: &str, reason: &str) -> QuarryError {
    log::error!("Cannot derive query from {}: {} {}", name, fragment, reason);
    QuarryError::new(
        &format!("cannot derive query from {}: '{}' {}", name, fragment, reason),
        ErrorKind::QueryDerivationError,
    )
}

/// Length of the longest token prefix that names a field of the entity.
fn field_prefix(meta: &EntityMeta, tokens: &[&str]) -> Option<usize> {
    (1..=tokens.len())
        .rev()
        .find(|&len| meta.has_field(&tokens[..len].join("_")))
}

fn parse_predicate(meta: &EntityMeta, name: &str, tokens: &[&str]) -> QuarryResult<Vec<Vec<Part>>> {
    let mut groups = Vec::new();
    for or_group in tokens.split(|t| *t == "or") {
        let mut parts = Vec::new();
        for part_tokens in or_group.split(|t| *t == "and") {
            if part_tokens.is_empty() {
                return Err(derivation_error(name, "and/or", "joins an empty clause"));
            }
            let fragment = part_tokens.join("_");
            let field_len = field_prefix(meta, part_tokens)
                .ok_or_else(|| derivation_error(name, &fragment, "does not start with a field"))?;
            let keyword = part_tokens[field_len..].join("_");
            let operator = Operator::from_keyword(&keyword)
                .ok_or_else(|| derivation_error(name, &keyword, "is not a known operator"))?;
            parts.push(Part {
                field: part_tokens[..field_len].join("_"),
                operator,
            });
        }
        groups.push(parts);
    }
    Ok(groups)
}

fn parse_sort(meta: &EntityMeta, name: &str, tokens: &[&str]) -> QuarryResult<Sort> {
    if tokens.is_empty() {
        return Err(derivation_error(name, "order_by", "has no sort field"));
    }

    let mut orders = Vec::new();
    let mut rest = tokens;
    while !rest.is_empty() {
        let field_len = field_prefix(meta, rest)
            .ok_or_else(|| derivation_error(name, &rest.join("_"), "is not a sortable field"))?;
        let field_name = rest[..field_len].join("_");
        rest = &rest[field_len..];

        let direction = match rest.first() {
            Some(&"desc") => {
                rest = &rest[1..];
                SortOrder::Descending
            }
            Some(&"asc") => {
                rest = &rest[1..];
                SortOrder::Ascending
            }
            _ => SortOrder::Ascending,
        };
        orders.push(Order::new(&field_name, direction));

        if rest.first() == Some(&"and") {
            rest = &rest[1..];
        }
    }
    Ok(Sort::from_orders(orders))
}
