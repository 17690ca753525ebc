//! Validated bytecode programs.

use crate::opcode::Instruction;
use serde::{Deserialize, Serialize};

/// Structural defect found while freezing a program.
///
/// The compiler never produces these for accepted input; they guard the
/// invariants the VM relies on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidProgram {
    /// The final instruction is not `Stop`
    #[error("program does not end with a stop instruction")]
    MissingStop,

    /// A jump operand points outside the instruction sequence
    #[error("jump target {target} at instruction {at} is out of range (program length {len})")]
    JumpOutOfRange { at: usize, target: usize, len: usize },
}

/// A complete, immutable bytecode program.
///
/// Programs are the artifact produced by the compiler and executed by the
/// VM. Construction validates the structural invariants: exactly one
/// terminal `Stop` placed last, and every jump operand in range. A frozen
/// program is read-only and safe to share across threads; concurrent
/// evaluations each build their own machine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Freeze an instruction sequence into a program.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidProgram`] when the sequence does not end with
    /// `Stop` or any jump operand is out of range.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, InvalidProgram> {
        if !matches!(instructions.last(), Some(Instruction::Stop)) {
            return Err(InvalidProgram::MissingStop);
        }
        for (at, instruction) in instructions.iter().enumerate() {
            if let Some(target) = instruction.jump_target() {
                if target >= instructions.len() {
                    return Err(InvalidProgram::JumpOutOfRange {
                        at,
                        target,
                        len: instructions.len(),
                    });
                }
            }
        }
        Ok(Self { instructions })
    }

    /// The instruction at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Number of instructions, gaps included.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The full instruction sequence.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::ProjectionKind;

    #[test]
    fn test_requires_terminal_stop() {
        let err = Program::new(vec![Instruction::PushCurrent]).unwrap_err();
        assert_eq!(err, InvalidProgram::MissingStop);
        assert!(Program::new(vec![Instruction::Stop]).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_jump() {
        let err = Program::new(vec![Instruction::Jump(7), Instruction::Stop]).unwrap_err();
        assert_eq!(
            err,
            InvalidProgram::JumpOutOfRange {
                at: 0,
                target: 7,
                len: 2
            }
        );
    }

    #[test]
    fn test_accepts_in_range_each_target() {
        let program = Program::new(vec![
            Instruction::Each {
                target: 2,
                kind: ProjectionKind::Array,
            },
            Instruction::Jump(0),
            Instruction::Stop,
        ])
        .unwrap();
        assert_eq!(program.len(), 3);
    }
}
