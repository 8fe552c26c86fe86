//! Expression evaluation inside the sandbox.

use kiln_analyzer::ast::{Element, Property};
use kiln_analyzer::Expr;
use kiln_artifact::Value;

use crate::injected::InjectedModules;
use crate::intrinsics;
use crate::program::{ChunkProgram, SlotRef, Step};

/// Evaluation result; the error is a human-readable reason.
pub(crate) type Eval<T> = Result<T, String>;

/// The environment of one step: its scope plus every earlier result.
pub(crate) struct Env<'a> {
    pub(crate) program: &'a ChunkProgram,
    pub(crate) step: &'a Step,
    pub(crate) done: &'a [Eval<Value>],
    pub(crate) injected: &'a InjectedModules,
}

impl Env<'_> {
    pub(crate) fn eval(&self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Ident { name, .. } => self.lookup(name),
            Expr::Array { elements, .. } => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    self.push_element(&mut out, element)?;
                }
                Ok(Value::Array(out))
            }
            Expr::Object { properties, .. } => self.eval_object(properties),
            Expr::Member {
                object, property, ..
            } => member(&self.eval(object)?, property),
            Expr::Index { object, index, .. } => index_into(&self.eval(object)?, &self.eval(index)?),
            Expr::Call { callee, args, .. } => self.eval_call(callee, args),
            Expr::Arrow { .. } | Expr::Function { .. } => {
                Err("functions cannot be evaluated in the sandbox".to_string())
            }
            Expr::DefinitionRef { path, .. } => match self.step.nested.get(path) {
                Some(slot) => self.slot(slot, path),
                None => Err(format!("nested definition `{path}` is not linked")),
            },
            Expr::Error { .. } => Err("expression contains a syntax error".to_string()),
        }
    }

    fn lookup(&self, name: &str) -> Eval<Value> {
        match self.step.scope.get(name) {
            Some(slot) => self.slot(slot, name),
            None => Err(format!("`{name}` is not defined")),
        }
    }

    fn slot(&self, slot: &SlotRef, name: &str) -> Eval<Value> {
        match slot {
            SlotRef::Step(index) => match self.done.get(*index) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(_)) => Err(format!(
                    "depends on `{}`, which failed to evaluate",
                    self.program.steps[*index].id
                )),
                None => Err(format!("`{name}` is read before it is evaluated")),
            },
            SlotRef::Import(id) => match self.program.imports.get(id) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(reason)) => Err(format!("depends on `{id}`, which is unavailable: {reason}")),
                None => Err(format!("`{id}` was not imported into the chunk")),
            },
            SlotRef::Injected { specifier, name } => self
                .injected
                .get(specifier, name)
                .cloned()
                .map_err(|e| e.to_string()),
            SlotRef::Intrinsic => Err(format!(
                "`{name}` can only be called as `{name}.<method>(...)`"
            )),
        }
    }

    fn push_element(&self, out: &mut Vec<Value>, element: &Element) -> Eval<()> {
        match element {
            Element::Item { expr } => out.push(self.eval(expr)?),
            Element::Spread { expr } => match self.eval(expr)? {
                Value::Array(items) => out.extend(items),
                Value::Element(element) => {
                    out.extend(element.fields().iter().cloned().map(Value::Field));
                }
                other => return Err(format!("cannot spread a {} into an array", other.type_name())),
            },
        }
        Ok(())
    }

    fn eval_object(&self, properties: &[Property]) -> Eval<Value> {
        let mut entries: Vec<(String, Value)> = Vec::with_capacity(properties.len());
        for property in properties {
            match property {
                Property::KeyValue { key, value, .. } => set(&mut entries, key, self.eval(value)?),
                Property::Shorthand { name, .. } => set(&mut entries, name, self.lookup(name)?),
                Property::Spread { expr } => match self.eval(expr)? {
                    Value::Object(spread) => {
                        for (key, value) in spread {
                            set(&mut entries, &key, value);
                        }
                    }
                    Value::Null => {}
                    other => return Err(format!("cannot spread a {} into an object", other.type_name())),
                },
            }
        }
        Ok(Value::Object(entries))
    }

    fn eval_call(&self, callee: &Expr, args: &[Element]) -> Eval<Value> {
        if let Expr::Member {
            object, property, ..
        } = callee
        {
            if let Expr::Ident { name, .. } = object.as_ref() {
                if self.step.scope.get(name) == Some(&SlotRef::Intrinsic) {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        self.push_element(&mut values, arg)?;
                    }
                    return intrinsics::call(property, values);
                }
            }
        }
        Err(format!("calling {} is not supported in the sandbox", describe(callee)))
    }
}

fn set(entries: &mut Vec<(String, Value)>, key: &str, value: Value) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key.to_string(), value)),
    }
}

fn member(value: &Value, property: &str) -> Eval<Value> {
    match value {
        Value::Object(_) => value
            .get(property)
            .cloned()
            .ok_or_else(|| format!("property `{property}` does not exist")),
        Value::Array(items) if property == "length" => Ok(Value::Number(items.len() as f64)),
        Value::String(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(format!("cannot read `{property}` of a {}", other.type_name())),
    }
}

fn index_into(value: &Value, index: &Value) -> Eval<Value> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => items
            .get(*n as usize)
            .cloned()
            .ok_or_else(|| format!("index {n} is out of bounds")),
        (Value::Object(_), Value::String(key)) => member(value, key),
        (value, index) => Err(format!(
            "cannot index a {} with a {}",
            value.type_name(),
            index.type_name()
        )),
    }
}

fn describe(callee: &Expr) -> String {
    match callee {
        Expr::Ident { name, .. } => format!("`{name}`"),
        Expr::Member { object, property, .. } => match object.as_ref() {
            Expr::Ident { name, .. } => format!("`{name}.{property}`"),
            _ => format!("`.{property}`"),
        },
        _ => "a computed function".to_string(),
    }
}
