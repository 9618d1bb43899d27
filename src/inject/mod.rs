pub mod engine;
pub mod types;

pub use engine::{ApplyOutcome, InstructionEngine};
pub use types::{InjectionLog, Instruction, InstructionAction, RawInstruction, ReversionRecord};
