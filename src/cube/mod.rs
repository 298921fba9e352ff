//! GAN Gen3 smart cube: wire protocol and BLE link.

pub mod link;
pub mod protocol;

pub use link::{
    BleTransport, CubeConnection, CubeLink, LinkConfig, LinkError, LinkEvent, LinkPhase,
    TransportError,
};
pub use protocol::{
    Characteristic, CubeCommand, CubeIdentity, CubeKey, CubeMove, CubePacket, CubeState,
    DecodeError, Face, IdentityError, Payload, Turn,
};
