//! Type providers resolve message types, their fields and enum constants.
//!
//! The checker never owns message metadata; it asks a [`TypeProvider`]
//! using fully qualified names. [`ProtoTypeProvider`] answers those
//! questions from a `prost_reflect::DescriptorPool`.

use std::fmt;

use log::debug;
use prost_reflect::prost::Message;
use prost_reflect::{DescriptorPool, FieldDescriptor, Kind};
use thiserror::Error;

use crate::{well_known_type, CelType, CelValue, VariableDecl};

/// Errors raised by type providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A message type the checker already resolved is no longer known.
    #[error("unknown message type '{0}'")]
    UnknownMessage(String),

    #[error("invalid descriptor set: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("failed to decode descriptor set: {0}")]
    Decode(#[from] prost_reflect::prost::DecodeError),
}

/// Source of type information for message types and enum constants.
///
/// All names passed in are fully qualified, without a leading dot.
pub trait TypeProvider: fmt::Debug + Send + Sync {
    /// Resolve a name to a type identifier (`type(T)`) or an enum constant.
    fn find_ident(&self, name: &str) -> Option<VariableDecl>;

    /// Resolve a name to a message type that can be constructed.
    fn find_struct_type(&self, name: &str) -> Option<CelType>;

    /// Type of `field` on `message`.
    ///
    /// `Ok(None)` means the message exists but has no such field.
    fn find_field_type(&self, message: &str, field: &str) -> Result<Option<CelType>, ProviderError>;
}

/// Type provider backed by protobuf descriptors.
#[derive(Debug, Clone)]
pub struct ProtoTypeProvider {
    pool: DescriptorPool,
}

impl ProtoTypeProvider {
    /// Create a provider with the well-known types pre-loaded.
    pub fn new() -> Self {
        Self {
            pool: DescriptorPool::global(),
        }
    }

    /// Create a provider from an existing descriptor pool.
    pub fn from_pool(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    /// Add a serialized `FileDescriptorSet`.
    pub fn add_file_descriptor_set(&mut self, bytes: &[u8]) -> Result<(), ProviderError> {
        let fds = prost_reflect::prost_types::FileDescriptorSet::decode(bytes)?;
        self.pool.add_file_descriptor_set(fds)?;
        Ok(())
    }

    /// Get the underlying descriptor pool.
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn enum_constant(&self, name: &str) -> Option<VariableDecl> {
        let (enum_name, value_name) = name.rsplit_once('.')?;
        let enum_desc = self.pool.get_enum_by_name(enum_name)?;
        let value = enum_desc.get_value_by_name(value_name)?;
        Some(VariableDecl::constant(
            name,
            CelType::Int,
            CelValue::Int(i64::from(value.number())),
        ))
    }

    fn field_to_cel_type(&self, field: &FieldDescriptor) -> CelType {
        if field.is_map() {
            if let Kind::Message(entry) = field.kind() {
                let key = entry
                    .get_field_by_name("key")
                    .map(|f| kind_to_cel_type(f.kind()))
                    .unwrap_or(CelType::Dyn);
                let value = entry
                    .get_field_by_name("value")
                    .map(|f| kind_to_cel_type(f.kind()))
                    .unwrap_or(CelType::Dyn);
                return CelType::map(key, value);
            }
            return CelType::map(CelType::Dyn, CelType::Dyn);
        }

        let base = kind_to_cel_type(field.kind());
        if field.is_list() {
            CelType::list(base)
        } else {
            base
        }
    }
}

impl Default for ProtoTypeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeProvider for ProtoTypeProvider {
    fn find_ident(&self, name: &str) -> Option<VariableDecl> {
        if let Some(message) = self.pool.get_message_by_name(name) {
            let cel_type = message_to_cel_type(message.full_name());
            return Some(VariableDecl::new(name, CelType::type_of(cel_type)));
        }
        self.enum_constant(name)
    }

    fn find_struct_type(&self, name: &str) -> Option<CelType> {
        self.pool
            .get_message_by_name(name)
            .map(|message| CelType::message(message.full_name()))
    }

    fn find_field_type(&self, message: &str, field: &str) -> Result<Option<CelType>, ProviderError> {
        let descriptor = self
            .pool
            .get_message_by_name(message)
            .ok_or_else(|| ProviderError::UnknownMessage(message.to_string()))?;
        let field_type = descriptor
            .get_field_by_name(field)
            .map(|f| self.field_to_cel_type(&f));
        if field_type.is_none() {
            debug!("message '{}' has no field '{}'", message, field);
        }
        Ok(field_type)
    }
}

/// CEL type of a message-typed value, mapping well-known types.
fn message_to_cel_type(full_name: &str) -> CelType {
    well_known_type(full_name).unwrap_or_else(|| CelType::message(full_name))
}

fn kind_to_cel_type(kind: Kind) -> CelType {
    match kind {
        Kind::Bool => CelType::Bool,
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            CelType::Int
        }
        Kind::Uint32 | Kind::Fixed32 | Kind::Uint64 | Kind::Fixed64 => CelType::UInt,
        Kind::Float | Kind::Double => CelType::Double,
        Kind::String => CelType::String,
        Kind::Bytes => CelType::Bytes,
        Kind::Message(msg) => message_to_cel_type(msg.full_name()),
        Kind::Enum(_) => CelType::Int,
    }
}
