//! Lowering of condition segments into SQL text with `?` placeholders.
//!
//! Tokens are separated by single spaces. Every bound value produces exactly
//! one `?` and one entry in `args`, in textual order.

use super::Segment;
use crate::registry::ModelRegistry;
use crate::value::Value;

pub(super) fn lower(segments: &[Segment], registry: &ModelRegistry, args: &mut Vec<Value>) -> String {
    let mut tokens = Vec::new();
    emit(segments, registry, args, &mut tokens);
    tokens.join(" ")
}

fn emit(segments: &[Segment], registry: &ModelRegistry, args: &mut Vec<Value>, out: &mut Vec<String>) {
    let start = out.len();
    // Logical keywords are held back until an operand follows, so a keyword
    // next to an empty group or at the end of a group never renders.
    let mut pending = None;

    for segment in segments {
        match segment {
            Segment::Keyword(keyword) if keyword.is_logical() => pending = Some(keyword),
            Segment::Group(_) if !segment.has_content() => {}
            _ => {
                if let Some(keyword) = pending.take() {
                    if out.len() > start {
                        out.push(keyword.as_sql().to_string());
                    }
                }
                match segment {
                    Segment::Column(column) => out.push(registry.resolve_column(column)),
                    Segment::Keyword(keyword) => out.push(keyword.as_sql().to_string()),
                    Segment::Value(value) => out.push(bind(value, args)),
                    Segment::RangeAnd => out.push("AND".to_string()),
                    Segment::Group(inner) => {
                        out.push("(".to_string());
                        emit(inner, registry, args, out);
                        out.push(")".to_string());
                    }
                }
            }
        }
    }
}

/// Placeholder text for one operand. Lists expand to `(?, ...)` with raw items
/// inlined and nested lists flattened; an empty list is `(NULL)`.
pub(crate) fn bind(value: &Value, args: &mut Vec<Value>) -> String {
    match value {
        Value::Raw(sql) => sql.clone(),
        Value::List(items) => {
            let mut placeholders = Vec::with_capacity(items.len());
            flatten(items, args, &mut placeholders);
            if placeholders.is_empty() {
                "(NULL)".to_string()
            } else {
                format!("({})", placeholders.join(", "))
            }
        }
        other => {
            args.push(other.clone());
            "?".to_string()
        }
    }
}

fn flatten(items: &[Value], args: &mut Vec<Value>, placeholders: &mut Vec<String>) {
    for item in items {
        match item {
            Value::List(inner) => flatten(inner, args, placeholders),
            Value::Raw(sql) => placeholders.push(sql.clone()),
            other => {
                args.push(other.clone());
                placeholders.push("?".to_string());
            }
        }
    }
}
