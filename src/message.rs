//! # Messages
//!
//! A message is any immutable value whose type opts into the [`Message`] marker
//! trait. Messages are routed by their concrete type: every published value is
//! keyed by a [`MessageType`], which compares by `TypeId` and never by value.
//!
//! ```rust
//! use eventbus_core::{Message, MessageType};
//!
//! #[derive(Debug)]
//! struct BoardChanged {
//!     board: String,
//! }
//!
//! impl Message for BoardChanged {}
//!
//! let message = BoardChanged { board: "uno".to_string() };
//! let erased: &dyn Message = &message;
//!
//! assert_eq!(erased.message_type(), MessageType::of::<BoardChanged>());
//! assert_eq!(MessageType::of::<BoardChanged>().short_name(), "BoardChanged");
//! assert_eq!(erased.downcast_ref::<BoardChanged>().map(|m| m.board.as_str()), Some("uno"));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

mod sealed {
    use super::MessageType;

    /// Runtime type identity; the blanket impl is the only one, so a message
    /// type cannot report a name other than its own
    pub trait Typed {
        fn runtime_type(&self) -> MessageType;
    }

    impl<T: Send + Sync + std::fmt::Debug + 'static> Typed for T {
        fn runtime_type(&self) -> MessageType {
            MessageType {
                id: std::any::TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            }
        }
    }
}

/// Marker for values that can be published on the bus
///
/// Implement it with an empty `impl Message for MyEvent {}`. Observers and
/// logs display the type's `std::any::type_name`.
pub trait Message: Any + Send + Sync + fmt::Debug + sealed::Typed {}

impl dyn Message {
    /// Routing key of the concrete message behind this reference
    pub fn message_type(&self) -> MessageType {
        sealed::Typed::runtime_type(self)
    }

    /// Fully qualified type name of the concrete message
    pub fn type_name(&self) -> &'static str {
        sealed::Typed::runtime_type(self).name()
    }

    /// Whether the concrete message is an `M`
    pub fn is<M: Message>(&self) -> bool {
        let any: &dyn Any = self;
        any.is::<M>()
    }

    /// Borrow the concrete message if it is an `M`
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        let any: &dyn Any = self;
        any.downcast_ref::<M>()
    }
}

/// Identity of a message type, used as the key of every registry map
#[derive(Clone, Copy)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    pub fn of<M: Message>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (`app::ui::BoardChanged` -> `BoardChanged`)
    ///
    /// Generic arguments are kept as written, only the leading path is removed.
    pub fn short_name(&self) -> &'static str {
        let base = match self.name.find('<') {
            Some(generic_start) => &self.name[..generic_start],
            None => self.name,
        };
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
