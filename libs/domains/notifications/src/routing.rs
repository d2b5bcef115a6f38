//! Routing keys of the form `events.<category>.update.<update type>`.

use crate::error::RoutingKeyError;

/// The parts of a routing key used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingKey<'a> {
    pub category: &'a str,
    pub update_type: &'a str,
}

/// Split a routing key on `.`, requiring at least four components.
pub fn parse_routing_key(key: &str) -> Result<RoutingKey<'_>, RoutingKeyError> {
    let components: Vec<&str> = key.split('.').collect();
    if components.len() < 4 {
        return Err(RoutingKeyError::TooFewComponents(key.to_string()));
    }

    Ok(RoutingKey {
        category: components[1],
        update_type: components[3],
    })
}
