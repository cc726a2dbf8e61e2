//! Type dispatch: pick the builder for a requested result type at runtime.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

use crate::builders;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::serializer::JsonPluggable;
use crate::types::{
    Ack, ConnectOrDisconnectAck, GrantAck, JoinOrLeaveAck, PublishAck, TypeTag, TypedEvent,
};

/// The closed set of result shapes this crate knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Message,
    Ack,
    ConnectOrDisconnect,
    Publish,
    Grant,
    JoinOrLeave,
}

/// A result built by [`DispatchTable::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Message(TypedEvent<Value>),
    Ack(Ack),
    ConnectOrDisconnect(ConnectOrDisconnectAck),
    Publish(PublishAck),
    Grant(GrantAck),
    JoinOrLeave(JoinOrLeaveAck),
    /// The requested type is not in the table; the envelope is returned as-is.
    Raw(Envelope),
}

impl Resolved {
    pub fn kind(&self) -> Option<ResultKind> {
        match self {
            Resolved::Message(_) => Some(ResultKind::Message),
            Resolved::Ack(_) => Some(ResultKind::Ack),
            Resolved::ConnectOrDisconnect(_) => Some(ResultKind::ConnectOrDisconnect),
            Resolved::Publish(_) => Some(ResultKind::Publish),
            Resolved::Grant(_) => Some(ResultKind::Grant),
            Resolved::JoinOrLeave(_) => Some(ResultKind::JoinOrLeave),
            Resolved::Raw(_) => None,
        }
    }
}

static STANDARD: LazyLock<DispatchTable> = LazyLock::new(DispatchTable::new);

/// Maps requested type tags to result kinds. Immutable once built.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    kinds: HashMap<TypeId, ResultKind>,
}

impl DispatchTable {
    /// Table holding the built-in result types.
    pub fn new() -> Self {
        let kinds = HashMap::from([
            (TypeId::of::<TypedEvent<Value>>(), ResultKind::Message),
            (TypeId::of::<Ack>(), ResultKind::Ack),
            (
                TypeId::of::<ConnectOrDisconnectAck>(),
                ResultKind::ConnectOrDisconnect,
            ),
            (TypeId::of::<PublishAck>(), ResultKind::Publish),
            (TypeId::of::<GrantAck>(), ResultKind::Grant),
            (TypeId::of::<JoinOrLeaveAck>(), ResultKind::JoinOrLeave),
        ]);
        Self { kinds }
    }

    /// Shared process-wide instance of [`DispatchTable::new`].
    pub fn standard() -> &'static DispatchTable {
        &STANDARD
    }

    /// Return a table that also maps `tag` to `kind`.
    pub fn with(mut self, tag: TypeTag, kind: ResultKind) -> Self {
        self.kinds.insert(tag.id(), kind);
        self
    }

    pub fn kind_of(&self, tag: &TypeTag) -> Option<ResultKind> {
        self.kinds.get(&tag.id()).copied()
    }

    /// Build the result for `tag` from `envelope`.
    ///
    /// Unknown tags hand the envelope back untouched as [`Resolved::Raw`].
    /// Acknowledgments carry `tag` as their result type.
    pub fn resolve<S: JsonPluggable + ?Sized>(
        &self,
        tag: TypeTag,
        envelope: Envelope,
        serializer: &S,
    ) -> Result<Resolved> {
        let Some(kind) = self.kind_of(&tag) else {
            tracing::debug!(
                result_type = tag.name(),
                "no builder registered, passing through"
            );
            return Ok(Resolved::Raw(envelope));
        };
        let resolved = match kind {
            ResultKind::Message => Resolved::Message(builders::event(&envelope, serializer)?),
            ResultKind::Ack => Resolved::Ack(builders::ack(&envelope, serializer, tag)?),
            ResultKind::ConnectOrDisconnect => {
                let ack = builders::connect_or_disconnect(&envelope, serializer, tag)?;
                Resolved::ConnectOrDisconnect(ack)
            }
            ResultKind::Publish => {
                Resolved::Publish(builders::publish(&envelope, serializer, tag)?)
            }
            ResultKind::Grant => Resolved::Grant(builders::grant(&envelope, serializer, tag)?),
            ResultKind::JoinOrLeave => {
                Resolved::JoinOrLeave(builders::join_or_leave(&envelope, serializer, tag)?)
            }
        };
        Ok(resolved)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve against the [standard](DispatchTable::standard) table.
pub fn resolve<S: JsonPluggable + ?Sized>(
    tag: TypeTag,
    envelope: Envelope,
    serializer: &S,
) -> Result<Resolved> {
    DispatchTable::standard().resolve(tag, envelope, serializer)
}
