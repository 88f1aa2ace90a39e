//! Codec module - DC field packing.
//!
//! Field values travel without type tags: the receiving side needs the
//! field's parameter types to read them back. [`FieldCodec`] packs and
//! unpacks one field at a time.
//!
//! # Design
//!
//! Like the other marker-struct codecs, [`FieldCodec`] has static methods
//! only. A value is packed into scratch space first, so a failed pack never
//! leaves partial bytes in the caller's datagram.
//!
//! # Example
//!
//! ```
//! use astron_db_client::codec::FieldCodec;
//! use astron_db_client::dclass::{DClass, FieldValue, ParameterType};
//! use astron_db_client::protocol::{Datagram, DatagramIterator};
//!
//! let class = DClass::new(0, "Toon", [("name", vec!["string".parse::<ParameterType>().unwrap()])]).unwrap();
//! let field = class.field_by_name("name").unwrap();
//!
//! let mut dg = Datagram::new();
//! FieldCodec::pack(field, &FieldValue::from("Flippy"), &mut dg).unwrap();
//!
//! let mut di = DatagramIterator::new(dg.as_bytes());
//! assert_eq!(di.get_u16().unwrap(), 0);
//! assert_eq!(FieldCodec::unpack(field, &mut di).unwrap(), FieldValue::from("Flippy"));
//! ```

mod field;
mod parameter;

pub use field::FieldCodec;
