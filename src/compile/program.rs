use super::target::{TargetBuilder, TargetOp, ValueId};
use super::CompileError;
use crate::dtype::ElementType;
use crate::vector::{NumericMatrix, NumericVector, VectorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("Missing program input \"{0}\"")]
    MissingInput(String),
    #[error("Input \"{name}\" expects {expected} elements of {dtype}")]
    WrongInput {
        name: String,
        dtype: ElementType,
        expected: usize,
    },
    #[error("Instruction {0} references an undefined value")]
    UndefinedValue(usize),
    #[error("Instruction {0} has the wrong number of arguments")]
    WrongArity(usize),
    #[error(transparent)]
    Vector(#[from] VectorError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum InstrKind {
    Input { name: String },
    Const { value: NumericVector },
    Op { op: TargetOp, args: Vec<ValueId> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Instruction {
    kind: InstrKind,
    dtype: ElementType,
    size: usize,
}

/// Sequential target representation in SSA form: each instruction defines the
/// value whose id is its position, so identical compiles produce identical
/// listings. Doubles as the reference executor via [`Program::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    instructions: Vec<Instruction>,
    outputs: Vec<(String, ValueId)>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Embedded constants in emission order.
    pub fn constants(&self) -> Vec<&NumericVector> {
        self.instructions
            .iter()
            .filter_map(|i| match &i.kind {
                InstrKind::Const { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Declared external inputs in emission order.
    pub fn inputs(&self) -> Vec<(&str, ElementType, usize)> {
        self.instructions
            .iter()
            .filter_map(|i| match &i.kind {
                InstrKind::Input { name } => Some((name.as_str(), i.dtype, i.size)),
                _ => None,
            })
            .collect()
    }

    pub fn outputs(&self) -> &[(String, ValueId)] {
        &self.outputs
    }

    fn push(&mut self, kind: InstrKind, dtype: ElementType, size: usize) -> ValueId {
        let id = ValueId::from_index(self.instructions.len());
        self.instructions.push(Instruction { kind, dtype, size });
        id
    }

    fn check_defined(&self, args: &[ValueId]) -> Result<(), CompileError> {
        for arg in args {
            if arg.index() >= self.instructions.len() {
                return Err(CompileError::UndefinedValue(*arg));
            }
        }
        Ok(())
    }

    /// Interprets the program. Every instruction executes once, in order.
    pub fn run(
        &self,
        inputs: &HashMap<String, NumericVector>,
    ) -> Result<HashMap<String, NumericVector>, ProgramError> {
        let mut values: Vec<NumericVector> = Vec::with_capacity(self.instructions.len());
        for (at, instr) in self.instructions.iter().enumerate() {
            let value = match &instr.kind {
                InstrKind::Input { name } => {
                    let v = inputs
                        .get(name)
                        .ok_or_else(|| ProgramError::MissingInput(name.clone()))?;
                    if v.dtype() != instr.dtype || v.len() != instr.size {
                        return Err(ProgramError::WrongInput {
                            name: name.clone(),
                            dtype: instr.dtype,
                            expected: instr.size,
                        });
                    }
                    v.clone()
                }
                InstrKind::Const { value } => value.clone(),
                InstrKind::Op { op, args } => {
                    let mut resolved = Vec::with_capacity(args.len());
                    for arg in args {
                        resolved.push(
                            values
                                .get(arg.index())
                                .ok_or(ProgramError::UndefinedValue(at))?,
                        );
                    }
                    exec_op(op, &resolved, at)?
                }
            };
            values.push(value);
        }
        let mut out = HashMap::new();
        for (name, id) in &self.outputs {
            let value = values
                .get(id.index())
                .ok_or(ProgramError::UndefinedValue(id.index()))?;
            out.insert(name.clone(), value.clone());
        }
        Ok(out)
    }
}

fn exec_op(
    op: &TargetOp,
    args: &[&NumericVector],
    at: usize,
) -> Result<NumericVector, ProgramError> {
    Ok(match op {
        TargetOp::Binary(kind) => {
            let [a, b] = args else {
                return Err(ProgramError::WrongArity(at));
            };
            NumericVector::binary_op(*kind, a, b)?
        }
        TargetOp::Unary(kind) => {
            let [x] = args else {
                return Err(ProgramError::WrongArity(at));
            };
            NumericVector::unary_op(*kind, x)?
        }
        TargetOp::Sum => {
            let [x] = args else {
                return Err(ProgramError::WrongArity(at));
            };
            x.sum()?
        }
        TargetOp::MatVec { rows, cols } => {
            let [flat, x] = args else {
                return Err(ProgramError::WrongArity(at));
            };
            NumericMatrix::from_flat(flat, *rows, *cols)?.matvec(x)?
        }
        TargetOp::Slice { start, len } => {
            let [x] = args else {
                return Err(ProgramError::WrongArity(at));
            };
            x.slice(*start, *len)?
        }
        TargetOp::Concat => {
            let parts: Vec<NumericVector> = args.iter().map(|a| (*a).clone()).collect();
            NumericVector::concat(&parts)?
        }
    })
}

impl TargetBuilder for Program {
    fn bind_input(
        &mut self,
        name: &str,
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError> {
        Ok(self.push(
            InstrKind::Input {
                name: name.to_string(),
            },
            dtype,
            size,
        ))
    }

    fn emit_constant(&mut self, value: NumericVector) -> Result<ValueId, CompileError> {
        let dtype = value.dtype();
        let size = value.len();
        Ok(self.push(InstrKind::Const { value }, dtype, size))
    }

    fn emit(
        &mut self,
        op: TargetOp,
        args: &[ValueId],
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError> {
        self.check_defined(args)?;
        let expected = match op {
            TargetOp::Binary(_) | TargetOp::MatVec { .. } => Some(2),
            TargetOp::Unary(_) | TargetOp::Sum | TargetOp::Slice { .. } => Some(1),
            TargetOp::Concat => None,
        };
        if let Some(expected) = expected {
            if args.len() != expected {
                return Err(CompileError::WrongArity { op: op.to_string() });
            }
        } else if args.is_empty() {
            return Err(CompileError::WrongArity { op: op.to_string() });
        }
        Ok(self.push(
            InstrKind::Op {
                op,
                args: args.to_vec(),
            },
            dtype,
            size,
        ))
    }

    fn mark_output(&mut self, name: &str, value: ValueId) -> Result<(), CompileError> {
        self.check_defined(&[value])?;
        self.outputs.push((name.to_string(), value));
        Ok(())
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, instr) in self.instructions.iter().enumerate() {
            let id = ValueId::from_index(i);
            match &instr.kind {
                InstrKind::Input { name } => {
                    writeln!(f, "{} = input \"{}\" : {}[{}]", id, name, instr.dtype, instr.size)?
                }
                InstrKind::Const { value } => {
                    writeln!(f, "{} = const {} : {}[{}]", id, value, instr.dtype, instr.size)?
                }
                InstrKind::Op { op, args } => {
                    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    writeln!(
                        f,
                        "{} = {} {} : {}[{}]",
                        id,
                        op,
                        rendered.join(", "),
                        instr.dtype,
                        instr.size
                    )?
                }
            }
        }
        for (name, id) in &self.outputs {
            writeln!(f, "output \"{}\" = {}", name, id)?;
        }
        Ok(())
    }
}
