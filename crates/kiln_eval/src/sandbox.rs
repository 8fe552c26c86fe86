//! The reference evaluator.

use kiln_artifact::Value;
use kiln_graph::NodeKind;
use tracing::{debug, trace};

use crate::error::LoadError;
use crate::injected::InjectedModules;
use crate::interp::{Env, Eval};
use crate::program::{ChunkProgram, SlotRef, Step};
use crate::{ChunkOutput, Evaluator};

/// Interprets chunk programs without any access to the host.
///
/// Steps run in order; a step that fails is recorded and every step reading
/// it fails in turn, while unrelated steps still produce values. Nothing
/// outside the program and the injected modules is reachable.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sandbox;

impl Sandbox {
    /// Creates the evaluator.
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for Sandbox {
    fn execute(&self, program: &ChunkProgram, injected: &InjectedModules) -> Result<ChunkOutput, LoadError> {
        link(program, injected)?;

        let mut done: Vec<Eval<Value>> = Vec::with_capacity(program.steps.len());
        for step in &program.steps {
            let env = Env {
                program,
                step,
                done: &done,
                injected,
            };
            let result = env.eval(&step.expr).and_then(|value| check_kind(step, value));
            if let Err(reason) = &result {
                trace!(id = %step.id, %reason, "step failed");
            }
            done.push(result);
        }

        let mut output = ChunkOutput::default();
        for (step, result) in program.steps.iter().zip(done) {
            match result {
                Ok(value) => {
                    output.values.insert(step.id.clone(), value);
                }
                Err(reason) => {
                    output.failures.insert(step.id.clone(), reason);
                }
            }
        }
        debug!(
            chunk = program.index,
            values = output.values.len(),
            failures = output.failures.len(),
            "chunk evaluated"
        );
        Ok(output)
    }
}

/// Checks that every slot of every step can be satisfied before running.
fn link(program: &ChunkProgram, injected: &InjectedModules) -> Result<(), LoadError> {
    for (index, step) in program.steps.iter().enumerate() {
        for slot in step.scope.values().chain(step.nested.values()) {
            match slot {
                SlotRef::Step(target) if *target >= index => {
                    return Err(LoadError::MalformedProgram(format!(
                        "`{}` reads step {target} before it is evaluated",
                        step.id
                    )));
                }
                SlotRef::Import(id) if !program.imports.contains_key(id) => {
                    return Err(LoadError::MalformedProgram(format!(
                        "`{}` reads `{id}`, which is not imported",
                        step.id
                    )));
                }
                SlotRef::Injected { specifier, name } => {
                    injected.get(specifier, name)?;
                }
                SlotRef::Step(_) | SlotRef::Import(_) | SlotRef::Intrinsic => {}
            }
        }
    }
    Ok(())
}

fn check_kind(step: &Step, value: Value) -> Eval<Value> {
    let NodeKind::Definition(kind) = step.kind else {
        return Ok(value);
    };
    match &value {
        Value::Element(element) if element.kind() == kind => Ok(value),
        other => Err(format!(
            "expected the {} definition to produce a {}, found a {}",
            step.id,
            kind.as_str(),
            other.type_name()
        )),
    }
}
