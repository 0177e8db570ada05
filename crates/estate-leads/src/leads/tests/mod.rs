mod common;

mod entitlement;
mod notifications;
mod routing;
