//! Base communication implementation for interacting with Scd41 device
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::{Error};
use crate::device::*;

/// CRC mismatch on a received word
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct CrcMismatch {
    /// CRC computed over the received data
    pub expected: u8,
    /// CRC byte sent by the device
    pub actual: u8,
}

impl <ConnErr> From<CrcMismatch> for Error<ConnErr> {
    fn from(e: CrcMismatch) -> Self {
        Error::Crc(e.expected, e.actual)
    }
}

/// Helper for device CRC-8 calculation
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;

    // For each byte
    for v in data {
        // XOR with current byte
        crc ^= v;

        // For each bit, MSB first
        for _bit in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    // Apply final xor
    crc ^ CRC_XOR
}

/// Encode a command opcode for the wire
pub fn encode_command(opcode: u16) -> [u8; 2] {
    opcode.to_be_bytes()
}

/// Encode a command argument for the wire
/// The argument must be followed by its own CRC byte
pub fn encode_argument(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Decode a single (MSB, LSB, CRC) word, checking the CRC
pub fn decode_word(buff: &[u8; 3]) -> Result<u16, CrcMismatch> {
    let crc = crc8(&buff[..2]);
    if crc != buff[2] {
        return Err(CrcMismatch{ expected: crc, actual: buff[2] });
    }

    Ok(u16::from_be_bytes([buff[0], buff[1]]))
}

/// Decode a response of N words, stopping at the first CRC mismatch
/// Callers must pass exactly N * 3 bytes
pub(crate) fn decode_words<const N: usize>(buff: &[u8]) -> Result<[u16; N], CrcMismatch> {
    // Responses MUST be 3 bytes per word (MSB, LSB, CRC)
    assert_eq!(buff.len(), N * 3);

    let mut words = [0u16; N];
    for (w, c) in words.iter_mut().zip(buff.chunks_exact(3)) {
        *w = decode_word(&[c[0], c[1], c[2]])?;
    }

    Ok(words)
}

/// Base API for reading and writing to the device
/// This should not be required by consumers, but is exposed to support alternate use
pub trait Base<Err> {
    /// Write a command with optional data, wait out the command delay, then read any response
    fn transfer(&mut self, command: Command, data: Option<u16>, resp: &mut [u8]) -> Result<(), Error<Err>>;

    /// Write a command to the device with optional data
    fn write_command(&mut self, command: Command, data: Option<u16>) -> Result<(), Error<Err>> {
        self.transfer(command, data, &mut [])
    }

    /// Read information from the device
    /// CRCs are not checked here
    fn read_command(&mut self, command: Command, resp: &mut [u8]) -> Result<(), Error<Err>> {
        self.transfer(command, None, resp)
    }

    /// Read a single CRC checked word from the device
    fn read_word(&mut self, command: Command) -> Result<u16, Error<Err>> {
        let mut buff = [0u8; 3];
        self.read_command(command, &mut buff)?;
        Ok(decode_word(&buff)?)
    }

    /// Write a command with data and read a single CRC checked word in response
    fn write_read_word(&mut self, command: Command, data: u16) -> Result<u16, Error<Err>> {
        let mut buff = [0u8; 3];
        self.transfer(command, Some(data), &mut buff)?;
        Ok(decode_word(&buff)?)
    }
}

/// Bus connection, delay provider and device address for a single sensor
pub struct Interface<Conn, Delay> {
    conn: Conn,
    delay: Delay,
    address: u8,
}

impl <Conn, Delay> Interface<Conn, Delay> {
    pub fn new(conn: Conn, delay: Delay, address: u8) -> Self {
        Interface{ conn, delay, address }
    }

    /// Release the underlying connection and delay
    pub fn release(self) -> (Conn, Delay) {
        (self.conn, self.delay)
    }
}

/// Base implementation for I2C devices
impl <Conn, Delay, Err> Base<Err> for Interface<Conn, Delay> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    fn transfer(&mut self, command: Command, data: Option<u16>, resp: &mut [u8]) -> Result<(), Error<Err>> {
        let spec = command.spec();
        let c = encode_command(spec.opcode);

        // Response buffers MUST match the catalog
        debug_assert_eq!(resp.len(), spec.response_len(), "response length for {:?}", command);

        let mut buff: [u8; 5] = [c[0], c[1], 0, 0, 0];

        let len = match data {
            Some(d) => {
                let a = encode_argument(d);
                buff[2] = a[0];
                buff[3] = a[1];
                buff[4] = crc8(&a);
                5
            },
            None => 2,
        };

        trace!("Writing command: {:?} ({:x?}) data: {:?}", command, &buff[..len], data);

        // First write the command, a failure here ends the exchange
        self.conn.write(self.address, &buff[..len])
            .map_err(Error::Write)?;

        // Then give the sensor time to process the command / prepare a response
        if spec.delay_ms > 0 {
            self.delay.delay_ms(spec.delay_ms);
        }

        if resp.is_empty() {
            return Ok(())
        }

        // Finally, read the data back
        self.conn.read(self.address, resp)
            .map_err(Error::Read)?;

        trace!("Read data: {:x?}", resp);

        Ok(())
    }
}
