//! Program instances

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::{FunctionRef, StringValue, Value};
use crate::error::{FreezerError, Result};
use crate::program::{MemberKind, Program};

/// Lifecycle of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Cloned from a program that is not finished yet; storage not
    /// initialized
    Pending,
    /// Initialized and usable
    Live,
    /// Explicitly destructed; encodes as `0`
    Destructed,
}

struct ObjectData {
    program: Program,
    storage: RefCell<Vec<Value>>,
    state: Cell<ObjectState>,
    deferred_create: RefCell<Option<Vec<Value>>>,
}

/// Shared handle to an instance of a [`Program`].
///
/// Equality and hashing are by identity.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    /// Clone `program` into a new instance. The program must be finished.
    pub fn instantiate(program: &Program) -> Result<Self> {
        if !program.is_finished() {
            return Err(FreezerError::graph(format!(
                "Cannot instantiate unfinished {:?}",
                program
            )));
        }
        let object = Object::pending(program);
        object.initialize()?;
        Ok(object)
    }

    /// Clone `program` without initializing storage.
    pub(crate) fn pending(program: &Program) -> Self {
        Object(Rc::new(ObjectData {
            program: program.clone(),
            storage: RefCell::new(Vec::new()),
            state: Cell::new(ObjectState::Pending),
            deferred_create: RefCell::new(None),
        }))
    }

    /// Allocate storage and run any `create` call that arrived while the
    /// object was pending.
    pub(crate) fn initialize(&self) -> Result<()> {
        if self.state() != ObjectState::Pending {
            return Ok(());
        }
        *self.0.storage.borrow_mut() = self.0.program.default_storage();
        self.0.state.set(ObjectState::Live);
        let deferred = self.0.deferred_create.borrow_mut().take();
        if let Some(args) = deferred {
            debug!(object = ?self.identity(), args = args.len(), "running deferred create");
            self.create(args)?;
        }
        Ok(())
    }

    /// The object's program.
    pub fn program(&self) -> Program {
        self.0.program.clone()
    }

    /// Lifecycle state.
    pub fn state(&self) -> ObjectState {
        self.0.state.get()
    }

    /// True after [`Object::destruct`].
    pub fn is_destructed(&self) -> bool {
        self.state() == ObjectState::Destructed
    }

    /// Address used as the object's identity.
    pub fn identity(&self) -> usize {
        super::refs::address(&self.0)
    }

    /// True when both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Release storage and mark the object destructed.
    pub fn destruct(&self) {
        self.0.storage.borrow_mut().clear();
        self.0.deferred_create.borrow_mut().take();
        self.0.state.set(ObjectState::Destructed);
    }

    /// Implicit constructor: assign `args` to the visible variables in
    /// declaration order. On a pending object the call is deferred until
    /// its program finishes.
    pub fn create(&self, args: Vec<Value>) -> Result<()> {
        match self.state() {
            ObjectState::Destructed => Err(FreezerError::graph("create() on destructed object")),
            ObjectState::Pending => {
                *self.0.deferred_create.borrow_mut() = Some(args);
                Ok(())
            }
            ObjectState::Live => {
                let slots = self.0.program.visible_variable_slots();
                if args.len() > slots.len() {
                    return Err(FreezerError::graph(format!(
                        "Too many arguments to create(): got {}, expected at most {}",
                        args.len(),
                        slots.len()
                    )));
                }
                let mut storage = self.0.storage.borrow_mut();
                for (slot, arg) in slots.into_iter().zip(args) {
                    if let Some(cell) = storage.get_mut(slot) {
                        *cell = arg;
                    }
                }
                Ok(())
            }
        }
    }

    /// Values of the visible variables, in the order `create` takes them.
    pub fn state_values(&self) -> Vec<Value> {
        let storage = self.0.storage.borrow();
        self.0
            .program
            .visible_variable_slots()
            .into_iter()
            .filter_map(|slot| storage.get(slot).cloned())
            .collect()
    }

    /// Look a member up by name: variables yield their current value,
    /// constants their value, functions a bound [`FunctionRef`].
    pub fn get(&self, name: &str) -> Option<Value> {
        let reference = self.0.program.find_member(name)?;
        let member = self.0.program.resolve(reference)?;
        match member.reference.kind {
            MemberKind::Variable => {
                let slot = self.0.program.storage_slot(reference)?;
                self.0.storage.borrow().get(slot).cloned()
            }
            MemberKind::Constant => {
                let data = member.program.data();
                let offset = data.constants.get(member.reference.index)?.offset?;
                data.constant_pool.get(offset).cloned()
            }
            MemberKind::Function => Some(Value::Function(FunctionRef::member(self.clone(), reference))),
        }
    }

    /// Assign a variable by name.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        if self.state() != ObjectState::Live {
            return Err(FreezerError::graph(format!(
                "Cannot assign {} on a {:?} object",
                name,
                self.state()
            )));
        }
        let slot = self
            .0
            .program
            .find_member(name)
            .and_then(|r| self.0.program.storage_slot(r))
            .ok_or_else(|| FreezerError::graph(format!("No variable {}", name)))?;
        let mut storage = self.0.storage.borrow_mut();
        let cell = storage
            .get_mut(slot)
            .ok_or_else(|| FreezerError::graph(format!("Storage slot {} out of range", slot)))?;
        *cell = value;
        Ok(())
    }

    /// Name of the member behind reference `reference` of this object's
    /// program.
    pub fn member_name(&self, reference: usize) -> Option<StringValue> {
        self.0.program.member_name(reference)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl std::hash::Hash for Object {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<object {:#x} {:?}>", self.identity(), self.state())
    }
}
