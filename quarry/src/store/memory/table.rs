use crate::common::{Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::Filter;
use crate::query::{FieldMutation, QuerySpec, Selection};
use im::OrdMap;
use itertools::Itertools;

/// Rows of one entity keyed by identity.
pub(crate) type Table = OrdMap<Value, Record>;

pub(crate) fn matching<'a>(table: &'a Table, filter: &Filter) -> QuarryResult<Vec<(&'a Value, &'a Record)>> {
    let mut rows = Vec::new();
    for (key, record) in table.iter() {
        if filter.apply(record)? {
            rows.push((key, record));
        }
    }
    Ok(rows)
}

pub(crate) fn select(table: &Table, spec: &QuerySpec) -> QuarryResult<Vec<Record>> {
    let mut rows: Vec<Record> = matching(table, spec.filter())?
        .into_iter()
        .map(|(_, record)| record.clone())
        .collect();

    if !spec.sort().is_unsorted() {
        // stable, so rows equal on every key keep identity order
        rows.sort_by(|a, b| spec.sort().compare(a, b));
    }

    let rows = match spec.selection() {
        Selection::Entities => rows,
        Selection::Fields(paths) => rows.iter().map(|row| row.select(paths)).collect(),
        Selection::Count => {
            let count = rows.len() as u64;
            return Ok(vec![Record::new().with("count", count)]);
        }
    };
    let rows = if spec.is_distinct() {
        rows.into_iter().unique().collect_vec()
    } else {
        rows
    };

    let offset = usize::try_from(spec.offset()).unwrap_or(usize::MAX);
    Ok(match spec.limit() {
        Some(limit) => rows
            .into_iter()
            .skip(offset)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect(),
        None => rows.into_iter().skip(offset).collect(),
    })
}

pub(crate) fn apply_mutations(record: &mut Record, mutations: &[FieldMutation]) -> QuarryResult<()> {
    for mutation in mutations {
        match mutation {
            FieldMutation::Set { field, value } => record.put(field.as_str(), value.clone()),
            FieldMutation::Increment { field, delta } => {
                let current = record.get(field);
                if current.is_null() {
                    log::error!("Cannot increment null field {} of {}", field, record);
                    return Err(QuarryError::new(
                        &format!("cannot increment field {} holding null", field),
                        ErrorKind::InvalidOperation,
                    ));
                }
                record.put(field.as_str(), current.add(delta)?);
            }
        }
    }
    Ok(())
}
