//! Program interpreter.

use std::sync::Arc;

use ceex_parser::ast::{Expression, Pattern};
use tracing::trace;

use crate::component::Components;
use crate::error::RenderError;
use crate::eval::Env;
use crate::generate::{AttrOp, ComponentCall, Op, Program, SlotOp, INNER_BLOCK};
use crate::safe::Safe;
use crate::value::{Assigns, Slot, SlotEntry, SlotRender, Slots, Value};

/// Render `program` in `env`.
pub fn render(program: &Program, env: &Env, components: &Arc<Components>) -> Result<Safe, RenderError> {
    let mut out = Safe::new();
    render_into(program, env, components, &mut out)?;
    Ok(out)
}

fn render_into(
    program: &Program,
    env: &Env,
    components: &Arc<Components>,
    out: &mut Safe,
) -> Result<(), RenderError> {
    for op in &program.ops {
        match op {
            Op::Static(text) => out.push_static(text),
            Op::Output(expr) => out.append(env.eval(expr)?.to_safe()?),
            Op::Exec(expr) => {
                env.eval(expr)?;
            }
            Op::Attr { name, value } => render_attr(name, &env.eval(value)?, out)?,
            Op::Spread(expr) => {
                for (name, value) in spread_pairs(env.eval(expr)?)? {
                    render_attr(&name, &value, out)?;
                }
            }
            Op::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if env.eval(condition)?.is_truthy() { then } else { otherwise };
                render_into(branch, env, components, out)?;
            }
            Op::For {
                generator,
                filter,
                body,
            } => {
                for scope in iterate(env, &generator.pattern, &generator.source, filter.as_ref())? {
                    render_into(body, &scope, components, out)?;
                }
            }
            Op::Component(call) => out.append(render_component(call, env, components)?),
        }
    }
    Ok(())
}

/// One scope per generator item that matches `pattern` and passes `filter`.
fn iterate(
    env: &Env,
    pattern: &Pattern,
    source: &Expression,
    filter: Option<&Expression>,
) -> Result<Vec<Env>, RenderError> {
    let mut scopes = Vec::new();
    for item in env.eval(source)?.enumerate()? {
        let Some(scope) = env.bind(pattern, &item)? else {
            continue;
        };
        if let Some(filter) = filter {
            if !scope.eval(filter)?.is_truthy() {
                continue;
            }
        }
        scopes.push(scope);
    }
    Ok(scopes)
}

// =========================================================================
// Attributes
// =========================================================================

/// Render ` name="value"`. `nil` and `false` drop the attribute, `true` renders it bare.
fn render_attr(name: &str, value: &Value, out: &mut Safe) -> Result<(), RenderError> {
    let rendered = match value {
        Value::Nil | Value::Bool(false) => return Ok(()),
        Value::Bool(true) => {
            out.push_raw(format!(" {name}"));
            return Ok(());
        }
        Value::Safe(safe) => safe.clone(),
        Value::List(items) if name == "class" => {
            let mut classes = Vec::new();
            for item in items.iter().filter(|v| v.is_truthy()) {
                classes.push(item.to_text()?);
            }
            Safe::escaped(&classes.join(" "))
        }
        other => Safe::escaped(&other.to_text()?),
    };

    out.push_raw(format!(" {name}=\""));
    out.append(rendered);
    out.push_raw("\"");
    Ok(())
}

/// Name/value pairs of a keyword list or map used as `{@rest}`.
fn spread_pairs(value: Value) -> Result<Vec<(String, Value)>, RenderError> {
    match value {
        Value::Map(map) => Ok(map.into_iter().collect()),
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Tuple(mut pair) if pair.len() == 2 => {
                    let value = pair.pop().unwrap_or(Value::Nil);
                    Ok((pair[0].as_key()?, value))
                }
                other => Err(RenderError::bad_argument(format!(
                    "expected {{name, value}} pairs in attribute list, got: {other}"
                ))),
            })
            .collect(),
        other => Err(RenderError::bad_argument(format!(
            "expected a keyword list or map for dynamic attributes, got: {other}"
        ))),
    }
}

fn attr_values(attrs: &[AttrOp], env: &Env) -> Result<Assigns, RenderError> {
    let mut values = Assigns::new();
    for attr in attrs {
        match attr {
            AttrOp::Static { name, value } => {
                values.insert(name.clone(), Value::Str(value.clone()));
            }
            AttrOp::Boolean { name } => {
                values.insert(name.clone(), Value::Bool(true));
            }
            AttrOp::Expr { name, value } => {
                values.insert(name.clone(), env.eval(value)?);
            }
            AttrOp::Spread(expr) => values.extend(spread_pairs(env.eval(expr)?)?),
        }
    }
    Ok(values)
}

// =========================================================================
// Components
// =========================================================================

fn render_component(
    call: &ComponentCall,
    env: &Env,
    components: &Arc<Components>,
) -> Result<Safe, RenderError> {
    let component = components
        .get(&call.name)
        .cloned()
        .ok_or_else(|| RenderError::UnknownComponent {
            name: call.display.clone(),
        })?;

    let attrs = attr_values(&call.attrs, env)?;

    let mut slots = Slots::new();
    let mut inner_block = Slot::new(INNER_BLOCK);
    if let Some(body) = &call.inner_block {
        let render = slot_render(body, call.binding.as_ref(), env, components);
        inner_block
            .entries
            .push(Arc::new(SlotEntry::new(INNER_BLOCK, Assigns::new(), Some(render))));
    }
    slots.insert(INNER_BLOCK.to_string(), inner_block);

    for slot in &call.slots {
        let entries = slot_entries(slot, env, components)?;
        slots
            .entry(slot.name.clone())
            .or_insert_with(|| Slot::new(slot.name.clone()))
            .entries
            .extend(entries);
    }

    trace!(
        component = %call.display,
        line = call.position.line,
        attrs = attrs.len(),
        slots = slots.len(),
        "calling component"
    );

    component.render(attrs, slots)
}

/// Entries produced by one `<:slot>` tag: none when `:if` fails, one per item with `:for`.
fn slot_entries(
    slot: &SlotOp,
    env: &Env,
    components: &Arc<Components>,
) -> Result<Vec<Arc<SlotEntry>>, RenderError> {
    let scopes = match &slot.generator {
        Some(generator) => iterate(env, &generator.pattern, &generator.source, slot.condition.as_ref())?,
        None => match &slot.condition {
            Some(condition) if !env.eval(condition)?.is_truthy() => Vec::new(),
            _ => vec![env.clone()],
        },
    };

    scopes
        .iter()
        .map(|scope| {
            let attrs = attr_values(&slot.attrs, scope)?;
            let render = slot
                .body
                .as_ref()
                .map(|body| slot_render(body, slot.binding.as_ref(), scope, components));
            Ok(Arc::new(SlotEntry::new(slot.name.clone(), attrs, render)))
        })
        .collect()
}

/// Deferred body of a slot entry, rendered in the caller's scope.
fn slot_render(
    body: &Arc<Program>,
    binding: Option<&Pattern>,
    env: &Env,
    components: &Arc<Components>,
) -> SlotRender {
    let body = Arc::clone(body);
    let binding = binding.cloned();
    let env = env.clone();
    let components = Arc::clone(components);

    Arc::new(move |arg: Value| {
        let scope = match &binding {
            Some(pattern) => env
                .bind(pattern, &arg)?
                .ok_or_else(|| RenderError::MatchFailure {
                    pattern: pattern.source.clone(),
                    value: arg.to_string(),
                })?,
            None => env.clone(),
        };
        render(&body, &scope, &components)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attr(name: &str, value: Value) -> String {
        let mut out = Safe::new();
        render_attr(name, &value, &mut out).unwrap();
        out.to_string()
    }

    #[test]
    fn test_attribute_values() {
        assert_eq!(attr("id", Value::str("a\"b")), " id=\"a&quot;b\"");
        assert_eq!(attr("n", Value::Int(3)), " n=\"3\"");
        assert_eq!(attr("hidden", Value::Bool(true)), " hidden");
        assert_eq!(attr("hidden", Value::Bool(false)), "");
        assert_eq!(attr("title", Value::Nil), "");
        assert_eq!(attr("data-x", Value::Safe(Safe::raw("&amp;"))), " data-x=\"&amp;\"");
    }

    #[test]
    fn test_class_list() {
        let classes = Value::List(vec![
            Value::str("btn"),
            Value::Nil,
            Value::Bool(false),
            Value::str("primary"),
        ]);
        assert_eq!(attr("class", classes), " class=\"btn primary\"");
    }

    #[test]
    fn test_spread_pairs() {
        let kw = Value::List(vec![
            Value::Tuple(vec![Value::atom("id"), Value::Int(1)]),
            Value::Tuple(vec![Value::str("data-x"), Value::str("y")]),
        ]);
        assert_eq!(
            spread_pairs(kw).unwrap(),
            vec![
                ("id".to_string(), Value::Int(1)),
                ("data-x".to_string(), Value::str("y"))
            ]
        );
        assert!(spread_pairs(Value::Int(1)).is_err());
    }
}
