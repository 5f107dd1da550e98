//! Output projection of resolved entity trees.
//!
//! Output keys follow the selector, not the plan: a child plan shared by two
//! sibling selectors carries the union of their fields, but each selector
//! only writes what it asked for.

use std::sync::Arc;

use docgraph_store::{Entity, LinkShape};
use serde_json::{Map, Value};

use crate::plan::QueryPlan;
use crate::resolver::QueryContext;
use crate::selector::Selector;

/// Builds the response object of one resolved entity.
///
/// Without a selector the entity is returned with every field.
pub(crate) fn project(
    ctx: &QueryContext<'_>,
    plan: &QueryPlan,
    selector: Option<&Selector>,
    entity: &Entity,
) -> Value {
    match selector {
        None => entity.to_value(),
        Some(selector) => {
            let mut out = Map::new();
            write(ctx, plan, selector, entity, &mut out, "");
            Value::Object(out)
        }
    }
}

fn write(
    ctx: &QueryContext<'_>,
    plan: &QueryPlan,
    selector: &Selector,
    entity: &Entity,
    out: &mut Map<String, Value>,
    prefix: &str,
) {
    match selector {
        Selector::Wildcard => {
            for (name, value) in entity.fields() {
                out.insert(format!("{prefix}{name}"), value.clone());
            }
        }
        Selector::Field(name) => {
            if let Some(value) = entity.get(name) {
                out.insert(format!("{prefix}{name}"), value.clone());
            }
        }
        Selector::List(items) => {
            for item in items {
                write(ctx, plan, item, entity, out, prefix);
            }
        }
        Selector::Ref { target, sub } => {
            let Some(child) = plan.child(target) else {
                return;
            };
            let LinkShape::Single(id) = entity.link(target) else {
                return;
            };
            let Some(referenced) = ctx.resolved_entity(child, &id) else {
                return;
            };
            let key = format!("{prefix}@{target}");
            match sub.as_deref() {
                None | Some(Selector::Wildcard) => {
                    out.insert(key, referenced.to_value());
                }
                Some(Selector::List(items)) => {
                    out.insert(key, Value::Object(embed(ctx, child, items, &referenced)));
                }
                Some(chained) => write(ctx, child, chained, &referenced, out, &format!("{key}.")),
            }
        }
        Selector::ManyRef { target, sub, .. } => {
            let Some(child) = plan.many_child(target) else {
                return;
            };
            let Some(members) = ctx.resolved_collection(child, &Some(entity.id().clone())) else {
                return;
            };
            let key = format!("{prefix}@[{target}]");
            match sub.as_deref() {
                None | Some(Selector::Wildcard) => {
                    let values = members.iter().map(|member| member.to_value()).collect();
                    out.insert(key, Value::Array(values));
                }
                Some(Selector::List(items)) => {
                    let values = members
                        .iter()
                        .map(|member| Value::Object(embed(ctx, child, items, member)))
                        .collect();
                    out.insert(key, Value::Array(values));
                }
                Some(Selector::Field(name)) => {
                    let values = members
                        .iter()
                        .filter_map(|member| member.get(name))
                        .filter(|value| !value.is_null())
                        .cloned()
                        .collect();
                    out.insert(format!("{key}.{name}"), Value::Array(values));
                }
                Some(chained) => {
                    if let Some((chain_key, values)) =
                        gather_chain(ctx, child, chained, &members, &key)
                    {
                        out.insert(chain_key, Value::Array(values));
                    }
                }
            }
        }
    }
}

/// Projects `items` of a referenced entity into a fresh embedded object.
fn embed(
    ctx: &QueryContext<'_>,
    plan: &QueryPlan,
    items: &[Selector],
    entity: &Entity,
) -> Map<String, Value> {
    let mut object = Map::new();
    for item in items {
        write(ctx, plan, item, entity, &mut object, "");
    }
    object
}

/// Follows a reference chain below a multi reference and collects one value
/// per member. Returns `None` when no member yields a value.
fn gather_chain(
    ctx: &QueryContext<'_>,
    plan: &QueryPlan,
    chained: &Selector,
    members: &[Arc<Entity>],
    key: &str,
) -> Option<(String, Vec<Value>)> {
    let prefix = format!("{key}.");
    let mut chain_key = None;
    let mut values = Vec::new();
    for member in members {
        let mut scratch = Map::new();
        write(ctx, plan, chained, member, &mut scratch, &prefix);
        for (name, value) in scratch {
            if value.is_null() {
                continue;
            }
            chain_key.get_or_insert(name);
            values.push(value);
        }
    }
    chain_key.map(|chain_key| (chain_key, values))
}
