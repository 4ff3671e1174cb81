//! Work queue of programs and objects waiting on unfinished inherits

use tracing::debug;

use crate::error::Result;
use crate::program::{mark_finished, Program};
use crate::value::Object;

/// Programs whose member tables are complete but whose inherit chain is
/// not yet finished, and objects cloned from such programs.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    programs: Vec<Program>,
    objects: Vec<Object>,
}

impl Pending {
    pub(crate) fn add_program(&mut self, program: Program) {
        debug!(program = ?program.identity(), "program waiting on inherits");
        self.programs.push(program);
    }

    pub(crate) fn add_object(&mut self, object: Object) {
        self.objects.push(object);
    }

    pub(crate) fn unfinished_programs(&self) -> usize {
        self.programs.len()
    }

    /// Finish every program whose inherits are now finished, repeating
    /// until nothing changes, then initialize the objects whose programs
    /// are finished.
    pub(crate) fn rescan(&mut self) -> Result<()> {
        loop {
            let (ready, waiting): (Vec<Program>, Vec<Program>) = self
                .programs
                .drain(..)
                .partition(|p| p.inherits_finished());
            self.programs = waiting;
            if ready.is_empty() {
                break;
            }
            for program in &ready {
                mark_finished(program);
            }
        }

        let (ready, waiting): (Vec<Object>, Vec<Object>) = self
            .objects
            .drain(..)
            .partition(|o| o.program().is_finished());
        self.objects = waiting;
        if !ready.is_empty() {
            debug!(objects = ready.len(), "initializing pending objects");
        }
        for object in ready {
            object.initialize()?;
        }
        Ok(())
    }

    /// Release half-built programs after a failed decode.
    pub(crate) fn teardown(&mut self) {
        for program in self.programs.drain(..) {
            debug!(program = ?program.identity(), "abandoning pending program");
            program.abandon();
        }
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{MemberFlags, ProgramBuilder};
    use crate::value::{TypeExpr, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rescan_finishes_in_dependency_order() {
        let mut base = ProgramBuilder::new();
        base.define_variable("x", TypeExpr::int(), MemberFlags::empty()).unwrap();
        base.end_pass_one().unwrap();
        let base_program = base.program().clone();

        let mut derived = ProgramBuilder::new();
        derived.inherit(&base_program, None, None, MemberFlags::empty()).unwrap();
        derived.end_pass_one().unwrap();
        let derived_program = derived.program().clone();

        let object = Object::pending(&derived_program);
        object.create(vec![Value::Int(7)]).unwrap();

        let mut pending = Pending::default();
        pending.add_program(derived_program.clone());
        pending.add_object(object.clone());
        pending.rescan().unwrap();
        assert_eq!(pending.unfinished_programs(), 1);
        assert!(object.get("x").is_none());

        pending.add_program(base_program);
        pending.rescan().unwrap();
        assert_eq!(pending.unfinished_programs(), 0);
        assert!(derived_program.is_finished());
        assert_eq!(object.get("x"), Some(Value::Int(7)));
    }

    #[test]
    fn test_teardown_releases_tables() {
        let mut b = ProgramBuilder::new();
        b.define_variable("x", TypeExpr::int(), MemberFlags::empty()).unwrap();
        b.end_pass_one().unwrap();
        let program = b.program().clone();

        let mut pending = Pending::default();
        pending.add_program(program.clone());
        pending.teardown();
        assert_eq!(pending.unfinished_programs(), 0);
        assert_eq!(program.num_references(), 0);
    }
}
