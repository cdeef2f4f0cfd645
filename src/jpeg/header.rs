//! Fixed baseline header: SOI, APP0, DQT, SOF0, DHT, SOS.
//!
//! Every segment has a constant size for this pipeline (three components,
//! two quant tables, the four standard Huffman tables), so the header is
//! always [`HEADER_LEN`] bytes. Only the quant values, the luma sampling
//! factors and the frame dimensions vary.

use super::quant::QuantTables;
use super::tables::{
    AC_CHROMA_BITS, AC_CHROMA_VALS, AC_LUMA_BITS, AC_LUMA_VALS, DC_CHROMA_BITS, DC_CHROMA_VALS,
    DC_LUMA_BITS, DC_LUMA_VALS,
};
use super::{Component, Subsampling};

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
const APP0: u8 = 0xE0;
const DQT: u8 = 0xDB;
const SOF0: u8 = 0xC0;
const DHT: u8 = 0xC4;
const SOS: u8 = 0xDA;

/// 2 (SOI) + 18 (APP0) + 134 (DQT) + 19 (SOF0) + 420 (DHT) + 14 (SOS).
pub const HEADER_LEN: usize = 607;

fn segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

fn write_huffman_table(body: &mut Vec<u8>, class_and_id: u8, bits: &[u8; 16], vals: &[u8]) {
    body.push(class_and_id);
    body.extend_from_slice(bits);
    body.extend_from_slice(vals);
}

/// Assemble the header for one frame.
pub fn build_header(
    quant: &QuantTables,
    subsampling: Subsampling,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&[0xFF, SOI]);

    // JFIF 1.01, no units, 1:1 aspect, no thumbnail.
    segment(
        &mut out,
        APP0,
        &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
    );

    let mut dqt = Vec::with_capacity(130);
    for id in 0..2u8 {
        dqt.push(id); // 8-bit precision
        dqt.extend_from_slice(&quant.zigzag(id));
    }
    segment(&mut out, DQT, &dqt);

    let (h, v) = subsampling.luma_factors();
    let mut sof = Vec::with_capacity(15);
    sof.push(8);
    // FrameLayout caps both sides at MAX_DIMENSION.
    sof.extend_from_slice(&(height as u16).to_be_bytes());
    sof.extend_from_slice(&(width as u16).to_be_bytes());
    sof.push(3);
    for component in Component::ALL {
        let factors = if component.is_luma() {
            ((h as u8) << 4) | v as u8
        } else {
            0x11
        };
        sof.extend_from_slice(&[component.index() as u8 + 1, factors, component.table_id()]);
    }
    segment(&mut out, SOF0, &sof);

    let mut dht = Vec::with_capacity(416);
    write_huffman_table(&mut dht, 0x00, &DC_LUMA_BITS, &DC_LUMA_VALS);
    write_huffman_table(&mut dht, 0x10, &AC_LUMA_BITS, &AC_LUMA_VALS);
    write_huffman_table(&mut dht, 0x01, &DC_CHROMA_BITS, &DC_CHROMA_VALS);
    write_huffman_table(&mut dht, 0x11, &AC_CHROMA_BITS, &AC_CHROMA_VALS);
    segment(&mut out, DHT, &dht);

    let mut sos = Vec::with_capacity(10);
    sos.push(3);
    for component in Component::ALL {
        let id = component.table_id();
        sos.extend_from_slice(&[component.index() as u8 + 1, (id << 4) | id]);
    }
    // Baseline: full spectral range, no successive approximation.
    sos.extend_from_slice(&[0, 63, 0]);
    segment(&mut out, SOS, &sos);

    debug_assert_eq!(out.len(), HEADER_LEN);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderKey {
    quality: u8,
    subsampling: Subsampling,
    width: u32,
    height: u32,
}

/// Single-entry cache; consecutive frames almost always share a header.
#[derive(Debug, Default)]
pub struct HeaderCache {
    entry: Option<(HeaderKey, Vec<u8>)>,
    builds: u64,
}

impl HeaderCache {
    pub fn get(
        &mut self,
        quant: &QuantTables,
        subsampling: Subsampling,
        width: u32,
        height: u32,
    ) -> &[u8] {
        let key = HeaderKey {
            quality: quant.quality,
            subsampling,
            width,
            height,
        };
        let stale = !matches!(&self.entry, Some((k, _)) if *k == key);
        if stale {
            self.builds += 1;
            self.entry = Some((key, build_header(quant, subsampling, width, height)));
        }
        match &self.entry {
            Some((_, bytes)) => bytes,
            None => &[],
        }
    }

    /// Number of times a header was rebuilt.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}
