//! GAN Gen3 smart cube wire protocol.
//!
//! Frames on the state characteristic are encrypted with AES-128-CBC using a
//! key and IV derived from the cube's MAC address. Only the first 16 bytes and,
//! for longer frames, the last 16 bytes are encrypted (the two chunks overlap
//! for frames shorter than 32 bytes).
//!
//! Decrypted frames start with the magic byte `0x55`. Frames of exactly 19
//! bytes carry the full cube state as packed permutation/orientation fields;
//! frames of any other length report moves or other events.

use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use heapless::Vec;

/// Largest frame accepted from or sent to the cube.
pub const MAX_PACKET_LEN: usize = 32;

/// AES block and minimum frame length.
pub const BLOCK_LEN: usize = 16;

/// Length of a facelets (full state) frame.
pub const FACELETS_PACKET_LEN: usize = 19;

/// First byte of every decrypted frame.
pub const FRAME_MAGIC: u8 = 0x55;

/// Primary GATT service.
pub const SERVICE_UUID: u128 = 0x8653000a_43e6_47b7_9cb0_5fc21d4ae340;

const BASE_KEY: [u8; 16] = [
    0x01, 0x02, 0x42, 0x28, 0x31, 0x91, 0x16, 0x07, 0x20, 0x05, 0x18, 0x54, 0x42, 0x11, 0x12, 0x53,
];
const BASE_IV: [u8; 16] = [
    0x11, 0x03, 0x32, 0x28, 0x21, 0x01, 0x76, 0x27, 0x20, 0x95, 0x78, 0x14, 0x32, 0x12, 0x02, 0x43,
];

/// A raw frame as delivered by, or handed to, the BLE stack.
pub type Payload = Vec<u8, MAX_PACKET_LEN>;

/// GATT characteristics used by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    /// Notifies encrypted state and move frames.
    State,
    /// Accepts encrypted command frames.
    Command,
}

impl Characteristic {
    pub const fn uuid(&self) -> u128 {
        match self {
            Characteristic::State => 0x8653000b_43e6_47b7_9cb0_5fc21d4ae340,
            Characteristic::Command => 0x8653000c_43e6_47b7_9cb0_5fc21d4ae340,
        }
    }
}

/// Errors from parsing a cube identity string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentityError {
    /// A character that is neither a hex digit nor a `:`/`-` separator.
    InvalidCharacter,
    /// Neither 12 (MAC) nor 32 (UUID) hex digits.
    InvalidLength,
}

impl core::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IdentityError::InvalidCharacter => write!(f, "identity contains a non-hex character"),
            IdentityError::InvalidLength => {
                write!(f, "identity must be a 12-digit MAC or a 32-digit UUID")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IdentityError {}

/// Errors from decoding a notification frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame shorter than one AES block.
    TooShort(usize),
    /// Frame longer than [`MAX_PACKET_LEN`].
    TooLong(usize),
    /// Decrypted frame does not start with [`FRAME_MAGIC`].
    UnexpectedHeader(u8),
    /// Facelets frame whose fields are not a valid cube state.
    InvalidState,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::TooShort(len) => write!(f, "frame too short ({} bytes)", len),
            DecodeError::TooLong(len) => write!(f, "frame too long ({} bytes)", len),
            DecodeError::UnexpectedHeader(byte) => {
                write!(f, "unexpected frame header 0x{:02x}", byte)
            }
            DecodeError::InvalidState => write!(f, "facelets frame is not a valid cube state"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// The paired cube, identified by its public MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CubeIdentity {
    mac: [u8; 6],
}

impl CubeIdentity {
    /// Identity from a MAC in display (big-endian) order.
    pub const fn from_mac(mac: [u8; 6]) -> Self {
        Self { mac }
    }

    /// Parses `"CF:AA:79:C9:96:9C"`, `"cfaa79c9969c"` or a 32-digit UUID as
    /// reported by some BLE stacks (the first 12 digits are the address).
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let mut digits = [0u8; 32];
        let mut count = 0;
        for c in text.chars() {
            if c == ':' || c == '-' {
                continue;
            }
            let digit = c.to_digit(16).ok_or(IdentityError::InvalidCharacter)? as u8;
            if count == digits.len() {
                return Err(IdentityError::InvalidLength);
            }
            digits[count] = digit;
            count += 1;
        }
        if count != 12 && count != 32 {
            return Err(IdentityError::InvalidLength);
        }
        let mut mac = [0u8; 6];
        for (i, byte) in mac.iter_mut().enumerate() {
            *byte = digits[2 * i] << 4 | digits[2 * i + 1];
        }
        Ok(Self { mac })
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    /// True if an advertised address belongs to this cube.
    ///
    /// Stacks disagree on address byte order, so both orders match.
    pub fn matches(&self, address: &[u8; 6]) -> bool {
        let mut reversed = *address;
        reversed.reverse();
        *address == self.mac || reversed == self.mac
    }

    /// Derives the session key for this cube.
    pub fn key(&self) -> CubeKey {
        let mut salt = self.mac;
        salt.reverse();
        let mut key = BASE_KEY;
        let mut iv = BASE_IV;
        for i in 0..salt.len() {
            key[i] = ((BASE_KEY[i] as u16 + salt[i] as u16) % 0xFF) as u8;
            iv[i] = ((BASE_IV[i] as u16 + salt[i] as u16) % 0xFF) as u8;
        }
        CubeKey { key, iv }
    }
}

/// AES-128 key and CBC IV for one cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeKey {
    key: [u8; 16],
    iv: [u8; 16],
}

impl CubeKey {
    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }

    fn decrypt_chunk(&self, cipher: &Aes128, chunk: &mut [u8]) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (out, (plain, iv)) in chunk.iter_mut().zip(block.iter().zip(self.iv.iter())) {
            *out = plain ^ iv;
        }
    }

    fn encrypt_chunk(&self, cipher: &Aes128, chunk: &mut [u8]) {
        for (byte, iv) in chunk.iter_mut().zip(self.iv.iter()) {
            *byte ^= iv;
        }
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.encrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }

    /// Decrypts a frame: last chunk first, then the first chunk.
    pub fn decrypt(&self, frame: &[u8]) -> Result<Payload, DecodeError> {
        let mut buf = Self::frame_buffer(frame)?;
        let cipher = Aes128::new(GenericArray::from_slice(&self.key));
        let len = buf.len();
        if len > BLOCK_LEN {
            self.decrypt_chunk(&cipher, &mut buf[len - BLOCK_LEN..]);
        }
        self.decrypt_chunk(&cipher, &mut buf[..BLOCK_LEN]);
        Ok(buf)
    }

    /// Encrypts a frame: first chunk first, then the last chunk.
    pub fn encrypt(&self, frame: &[u8]) -> Result<Payload, DecodeError> {
        let mut buf = Self::frame_buffer(frame)?;
        let cipher = Aes128::new(GenericArray::from_slice(&self.key));
        let len = buf.len();
        self.encrypt_chunk(&cipher, &mut buf[..BLOCK_LEN]);
        if len > BLOCK_LEN {
            self.encrypt_chunk(&cipher, &mut buf[len - BLOCK_LEN..]);
        }
        Ok(buf)
    }

    fn frame_buffer(frame: &[u8]) -> Result<Payload, DecodeError> {
        if frame.len() < BLOCK_LEN {
            return Err(DecodeError::TooShort(frame.len()));
        }
        Payload::from_slice(frame).map_err(|_| DecodeError::TooLong(frame.len()))
    }
}

/// A cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Face {
    Up,
    Right,
    Front,
    Down,
    Left,
    Back,
}

/// A quarter turn of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Turn {
    pub face: Face,
    pub prime: bool,
}

impl Turn {
    /// Move codes as used in move frames, in code order.
    const TABLE: [Turn; 12] = [
        Turn { face: Face::Back, prime: false },
        Turn { face: Face::Back, prime: true },
        Turn { face: Face::Front, prime: false },
        Turn { face: Face::Front, prime: true },
        Turn { face: Face::Up, prime: false },
        Turn { face: Face::Up, prime: true },
        Turn { face: Face::Down, prime: false },
        Turn { face: Face::Down, prime: true },
        Turn { face: Face::Right, prime: false },
        Turn { face: Face::Right, prime: true },
        Turn { face: Face::Left, prime: false },
        Turn { face: Face::Left, prime: true },
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE.get(code as usize).copied()
    }
}

/// A decoded move report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CubeMove {
    pub turn: Turn,
    pub serial: u16,
}

/// Piece permutation and orientation of the whole cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CubeState {
    pub corner_permutation: [u8; 8],
    pub corner_orientation: [u8; 8],
    pub edge_permutation: [u8; 12],
    pub edge_orientation: [u8; 12],
}

const CP_OFFSET: usize = 40;
const CO_OFFSET: usize = 61;
const EP_OFFSET: usize = 77;
const EO_OFFSET: usize = 121;

fn read_bits(data: &[u8], start: usize, count: usize) -> u8 {
    let mut value = 0u8;
    for bit in start..start + count {
        let set = data[bit / 8] >> (7 - bit % 8) & 1;
        value = value << 1 | set;
    }
    value
}

fn write_bits(data: &mut [u8], start: usize, count: usize, value: u8) {
    for i in 0..count {
        let bit = start + i;
        let mask = 1 << (7 - bit % 8);
        if value >> (count - 1 - i) & 1 == 1 {
            data[bit / 8] |= mask;
        } else {
            data[bit / 8] &= !mask;
        }
    }
}

fn is_permutation(values: &[u8]) -> bool {
    let mut seen = 0u16;
    for &v in values {
        if v as usize >= values.len() || seen & (1 << v) != 0 {
            return false;
        }
        seen |= 1 << v;
    }
    true
}

impl CubeState {
    pub const SOLVED: CubeState = CubeState {
        corner_permutation: [0, 1, 2, 3, 4, 5, 6, 7],
        corner_orientation: [0; 8],
        edge_permutation: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        edge_orientation: [0; 12],
    };

    /// Decodes the packed state of a decrypted facelets frame.
    ///
    /// The last corner and edge are not transmitted; they follow from the
    /// other pieces because permutations and orientation sums are fixed.
    pub fn from_frame(clear: &[u8]) -> Result<Self, DecodeError> {
        if clear.len() < FACELETS_PACKET_LEN {
            return Err(DecodeError::TooShort(clear.len()));
        }
        let mut state = CubeState::SOLVED;

        for i in 0..7 {
            state.corner_permutation[i] = read_bits(clear, CP_OFFSET + i * 3, 3);
            state.corner_orientation[i] = read_bits(clear, CO_OFFSET + i * 2, 2);
        }
        for i in 0..11 {
            state.edge_permutation[i] = read_bits(clear, EP_OFFSET + i * 4, 4);
            state.edge_orientation[i] = read_bits(clear, EO_OFFSET + i, 1);
        }

        let cp_sum: u16 = state.corner_permutation[..7].iter().map(|&v| v as u16).sum();
        let co_sum: u16 = state.corner_orientation[..7].iter().map(|&v| v as u16).sum();
        let ep_sum: u16 = state.edge_permutation[..11].iter().map(|&v| v as u16).sum();
        let eo_sum: u16 = state.edge_orientation[..11].iter().map(|&v| v as u16).sum();

        state.corner_permutation[7] = 28u16.checked_sub(cp_sum).ok_or(DecodeError::InvalidState)? as u8;
        state.corner_orientation[7] = ((3 - co_sum % 3) % 3) as u8;
        state.edge_permutation[11] = 66u16.checked_sub(ep_sum).ok_or(DecodeError::InvalidState)? as u8;
        state.edge_orientation[11] = ((2 - eo_sum % 2) % 2) as u8;

        let orientations_valid = state.corner_orientation.iter().all(|&o| o <= 2);
        if !is_permutation(&state.corner_permutation)
            || !is_permutation(&state.edge_permutation)
            || !orientations_valid
        {
            return Err(DecodeError::InvalidState);
        }
        Ok(state)
    }

    /// Builds the decrypted facelets frame for this state.
    pub fn to_frame(&self) -> [u8; FACELETS_PACKET_LEN] {
        let mut frame = [0u8; FACELETS_PACKET_LEN];
        frame[0] = FRAME_MAGIC;
        frame[1] = 0x02;
        for i in 0..7 {
            write_bits(&mut frame, CP_OFFSET + i * 3, 3, self.corner_permutation[i]);
            write_bits(&mut frame, CO_OFFSET + i * 2, 2, self.corner_orientation[i]);
        }
        for i in 0..11 {
            write_bits(&mut frame, EP_OFFSET + i * 4, 4, self.edge_permutation[i]);
            write_bits(&mut frame, EO_OFFSET + i, 1, self.edge_orientation[i]);
        }
        frame
    }

    pub fn is_solved(&self) -> bool {
        *self == CubeState::SOLVED
    }
}

/// A decrypted, classified notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CubePacket {
    /// Full cube state.
    Facelets(CubeState),
    /// A move happened; the turn is only known for some frame variants.
    Move(Option<CubeMove>),
    /// Any other frame type (battery, hardware info, ...).
    Other(u8),
}

/// Parses a `0x55 0x02` move frame.
///
/// Some firmware sends the tail of the frame reversed; if the move code is
/// out of range the tail is reversed and the code read again.
fn parse_move_variant(clear: &[u8]) -> Option<CubeMove> {
    if clear.len() < BLOCK_LEN {
        return None;
    }
    let len = clear.len().min(MAX_PACKET_LEN);
    let mut buf = [0u8; MAX_PACKET_LEN];
    buf[..len].copy_from_slice(&clear[..len]);
    let frame = &mut buf[..len];
    if frame[5] > 0x0B {
        frame[2..].reverse();
    }
    let turn = Turn::from_code(frame[5])?;
    let serial = u16::from_le_bytes([frame[2], frame[3]]);
    Some(CubeMove { turn, serial })
}

/// Classifies a decrypted frame.
pub fn classify(clear: &[u8]) -> Result<CubePacket, DecodeError> {
    if clear.len() < BLOCK_LEN {
        return Err(DecodeError::TooShort(clear.len()));
    }
    if clear[0] != FRAME_MAGIC {
        return Err(DecodeError::UnexpectedHeader(clear[0]));
    }
    if clear.len() == FACELETS_PACKET_LEN {
        return CubeState::from_frame(clear).map(CubePacket::Facelets);
    }
    Ok(match clear[1] {
        0x01 => CubePacket::Move(None),
        0x02 => CubePacket::Move(parse_move_variant(clear)),
        other => CubePacket::Other(other),
    })
}

/// Decrypts and classifies one notification.
pub fn decode(frame: &[u8], key: &CubeKey) -> Result<CubePacket, DecodeError> {
    let clear = key.decrypt(frame)?;
    classify(&clear)
}

/// Commands written to the command characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CubeCommand {
    /// Ask the cube to report its full state.
    RequestFacelets,
    /// Ask for the battery level.
    RequestBattery,
    /// Ask for hardware information.
    RequestHardware,
    /// Tell the cube its current physical state is solved.
    ResetSolved,
}

impl CubeCommand {
    /// Unencrypted command frame.
    pub fn frame(&self) -> [u8; BLOCK_LEN] {
        match self {
            CubeCommand::RequestFacelets => [0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            CubeCommand::RequestBattery => [0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            CubeCommand::RequestHardware => [0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            CubeCommand::ResetSolved => [
                0x68, 0x05, 0x05, 0x39, 0x77, 0x00, 0x00, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
                0x00, 0x00, 0x00,
            ],
        }
    }

    /// Encrypted frame ready to write.
    pub fn encrypt(&self, key: &CubeKey) -> Result<Payload, DecodeError> {
        key.encrypt(&self.frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_round_trip_across_byte_boundaries() {
        let mut data = [0u8; 4];
        write_bits(&mut data, 6, 4, 0b1011);
        assert_eq!(data[0], 0b0000_0010);
        assert_eq!(data[1], 0b1100_0000);
        assert_eq!(read_bits(&data, 6, 4), 0b1011);
    }

    #[test]
    fn permutation_check_rejects_duplicates() {
        assert!(is_permutation(&[2, 0, 1]));
        assert!(!is_permutation(&[0, 0, 2]));
        assert!(!is_permutation(&[0, 1, 3]));
    }

    #[test]
    fn move_variant_falls_back_to_reversed_tail() {
        let mut clear = [0u8; 16];
        clear[0] = FRAME_MAGIC;
        clear[1] = 0x02;
        // Reversed tail: the move code sits at index 12, the serial at 14..16.
        clear[5] = 0xFF;
        clear[12] = 0x08;
        clear[15] = 0x34;
        clear[14] = 0x12;
        let mv = parse_move_variant(&clear).unwrap();
        assert_eq!(mv.turn, Turn { face: Face::Right, prime: false });
        assert_eq!(mv.serial, 0x1234);
    }
}
