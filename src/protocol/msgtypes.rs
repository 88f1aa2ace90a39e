//! Astron message-type constants used by the database client.
//!
//! Values follow the Astron message set. Every server-bound datagram carries
//! one of these as the `uint16` at the end of its server header.

/// Channel that control messages are addressed to.
pub const CONTROL_CHANNEL: u64 = 1;

/// Subscribe the connection to a channel.
pub const CONTROL_ADD_CHANNEL: u16 = 9000;
/// Unsubscribe the connection from a channel.
pub const CONTROL_REMOVE_CHANNEL: u16 = 9001;
/// Name the connection for the message director's logs.
pub const CONTROL_SET_CON_NAME: u16 = 9012;

pub const DBSERVER_CREATE_OBJECT: u16 = 3000;
pub const DBSERVER_CREATE_OBJECT_RESP: u16 = 3001;

pub const DBSERVER_OBJECT_GET_FIELD: u16 = 3010;
pub const DBSERVER_OBJECT_GET_FIELD_RESP: u16 = 3011;
pub const DBSERVER_OBJECT_GET_FIELDS: u16 = 3012;
pub const DBSERVER_OBJECT_GET_FIELDS_RESP: u16 = 3013;
pub const DBSERVER_OBJECT_GET_ALL: u16 = 3014;
pub const DBSERVER_OBJECT_GET_ALL_RESP: u16 = 3015;

pub const DBSERVER_OBJECT_SET_FIELD: u16 = 3020;
pub const DBSERVER_OBJECT_SET_FIELDS: u16 = 3021;
pub const DBSERVER_OBJECT_SET_FIELD_IF_EQUALS: u16 = 3022;
pub const DBSERVER_OBJECT_SET_FIELD_IF_EQUALS_RESP: u16 = 3023;
pub const DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS: u16 = 3024;
pub const DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP: u16 = 3025;

/// Symbolic name of a message type, for logs.
pub fn name(msg_type: u16) -> Option<&'static str> {
    Some(match msg_type {
        CONTROL_ADD_CHANNEL => "CONTROL_ADD_CHANNEL",
        CONTROL_REMOVE_CHANNEL => "CONTROL_REMOVE_CHANNEL",
        CONTROL_SET_CON_NAME => "CONTROL_SET_CON_NAME",
        DBSERVER_CREATE_OBJECT => "DBSERVER_CREATE_OBJECT",
        DBSERVER_CREATE_OBJECT_RESP => "DBSERVER_CREATE_OBJECT_RESP",
        DBSERVER_OBJECT_GET_FIELD => "DBSERVER_OBJECT_GET_FIELD",
        DBSERVER_OBJECT_GET_FIELD_RESP => "DBSERVER_OBJECT_GET_FIELD_RESP",
        DBSERVER_OBJECT_GET_FIELDS => "DBSERVER_OBJECT_GET_FIELDS",
        DBSERVER_OBJECT_GET_FIELDS_RESP => "DBSERVER_OBJECT_GET_FIELDS_RESP",
        DBSERVER_OBJECT_GET_ALL => "DBSERVER_OBJECT_GET_ALL",
        DBSERVER_OBJECT_GET_ALL_RESP => "DBSERVER_OBJECT_GET_ALL_RESP",
        DBSERVER_OBJECT_SET_FIELD => "DBSERVER_OBJECT_SET_FIELD",
        DBSERVER_OBJECT_SET_FIELDS => "DBSERVER_OBJECT_SET_FIELDS",
        DBSERVER_OBJECT_SET_FIELD_IF_EQUALS => "DBSERVER_OBJECT_SET_FIELD_IF_EQUALS",
        DBSERVER_OBJECT_SET_FIELD_IF_EQUALS_RESP => "DBSERVER_OBJECT_SET_FIELD_IF_EQUALS_RESP",
        DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS => "DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS",
        DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP => "DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_follow_requests() {
        assert_eq!(DBSERVER_CREATE_OBJECT_RESP, DBSERVER_CREATE_OBJECT + 1);
        assert_eq!(DBSERVER_OBJECT_GET_FIELD_RESP, DBSERVER_OBJECT_GET_FIELD + 1);
        assert_eq!(DBSERVER_OBJECT_GET_FIELDS_RESP, DBSERVER_OBJECT_GET_FIELDS + 1);
        assert_eq!(DBSERVER_OBJECT_GET_ALL_RESP, DBSERVER_OBJECT_GET_ALL + 1);
        assert_eq!(
            DBSERVER_OBJECT_SET_FIELD_IF_EQUALS_RESP,
            DBSERVER_OBJECT_SET_FIELD_IF_EQUALS + 1
        );
        assert_eq!(
            DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP,
            DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS + 1
        );
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(name(3000), Some("DBSERVER_CREATE_OBJECT"));
        assert_eq!(name(9000), Some("CONTROL_ADD_CHANNEL"));
        assert_eq!(name(1234), None);
    }
}
