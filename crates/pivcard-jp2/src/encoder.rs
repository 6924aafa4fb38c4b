//! JPEG 2000 (Part 1) encoder adapter binding to the `openjp2` crate.
//!
//! This module isolates every `openjp2`-specific type and parameter name behind
//! [`Jp2Encoder::encode`]; nothing outside this file names an `opj_*` type. That isolation matters
//! here in particular because the encoder this crate binds to does not expose the rectangular,
//! start-level-and-alignment ROI model used by the rest of this workspace (see "ROI mapping"
//! below) — the simplification is confined to this one file.
use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{ensure, Context};
use once_cell::sync::Lazy;
use openjp2::openjpeg::{
    opj_cparameters_t, opj_create_compress, opj_destroy_codec, opj_encode, opj_end_compress, opj_image_cmptparm_t,
    opj_image_create, opj_image_destroy, opj_set_default_encoder_parameters, opj_setup_encoder, opj_start_compress,
    opj_stream_create_default_file_stream, opj_stream_destroy, OPJ_CLRSPC_SRGB, OPJ_CODEC_FORMAT::OPJ_CODEC_JP2,
};
use pivcard_image::{Image, Rect};

/// libopenjpeg's encoder setup is not documented as thread-safe; every call into it in this
/// process is serialized behind this lock, mirroring the concurrency note in this workspace's
/// neural-network loaders.
static ENCODE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Target maxshift value applied to the inner ROI's component when ROI is enabled. OpenJPEG's
/// compressor only exposes a single per-component upshift (`roi_shift`, 0-37), not the
/// rectangular-region-with-start-level contract the rest of this workspace speaks: see "ROI
/// mapping" below.
const MAX_ROI_SHIFT: i32 = 37;

#[derive(Debug, thiserror::Error)]
pub enum Jp2Error {
    #[error("openjp2 image creation failed")]
    ImageCreation,
    #[error("openjp2 codec setup failed")]
    CodecSetup,
    #[error("openjp2 compression failed")]
    Compression,
}

/// Parameters for a single encode attempt, already translated out of the workspace's
/// `ProcessingOptions` into encoder terms.
pub struct EncodeParams {
    /// Target bits-per-pixel rate, expressed the way [`crate::table`] expects it.
    pub rate: f32,
    /// The inner ROI rectangle and the `roi_start_level`/`align_roi` options, if ROI emphasis is
    /// enabled for this encode.
    pub roi: Option<RoiParams>,
}

#[derive(Debug, Clone, Copy)]
pub struct RoiParams {
    pub rect: Rect,
    pub start_level: u8,
    pub align: bool,
}

/// A stateless encoder: construction just validates the library is linked and usable: there is no
/// persistent handle to hold between calls, since `openjp2` allocates a fresh codec per image.
pub struct Jp2Encoder;

impl Jp2Encoder {
    pub fn new() -> Self {
        Self
    }

    /// Encodes `image` to a JP2 Part 1 codestream at the given rate, applying ROI maxshift
    /// emphasis if requested.
    ///
    /// # ROI mapping
    ///
    /// The rest of this workspace's contract (see `pivcard_core::roi`) describes ROI emphasis as
    /// a rectangular region, a `roi_start_level` (the resolution level above which the region
    /// stops applying), and an `align_roi` flag. Plain `openjp2`/OpenJPEG does not implement that
    /// model: its only ROI knob is `roi_shift`, an integer upshift applied to *one entire image
    /// component*, with no per-pixel spatial mask. This adapter approximates the contract by
    /// deriving a shift magnitude from `start_level` (a smaller `start_level`, i.e. ROI emphasis
    /// surviving to finer resolutions, maps to a larger shift) and applying it to component 0.
    /// `align` has no equivalent here and is accepted but ignored. This is a deliberate,
    /// documented simplification, not an oversight.
    pub fn encode(&self, image: &Image, params: &EncodeParams) -> anyhow::Result<Vec<u8>> {
        let _guard = ENCODE_LOCK.lock().expect("encode lock poisoned");
        encode_inner(image, params).context("openjp2 encode failed")
    }
}

impl Default for Jp2Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_inner(image: &Image, params: &EncodeParams) -> anyhow::Result<Vec<u8>> {
    let width = image.width();
    let height = image.height();
    ensure!(width > 0 && height > 0, "cannot encode an empty image");

    let view = image.view(&image.rect());

    // SAFETY: every opj_* call below follows the standard single-threaded compress workflow
    // (create image -> create codec -> setup encoder -> start/encode/end -> read memory stream),
    // serialized by `ENCODE_LOCK`, with every allocation freed on all exit paths including error
    // returns.
    unsafe {
        let mut comp_params: [opj_image_cmptparm_t; 3] = std::mem::zeroed();
        for c in comp_params.iter_mut() {
            c.dx = 1;
            c.dy = 1;
            c.w = width;
            c.h = height;
            c.x0 = 0;
            c.y0 = 0;
            c.prec = 8;
            c.bpp = 8;
            c.sgnd = 0;
        }

        let opj_image = opj_image_create(3, comp_params.as_mut_ptr(), OPJ_CLRSPC_SRGB);
        ensure!(!opj_image.is_null(), "{}", Jp2Error::ImageCreation);
        (*opj_image).x0 = 0;
        (*opj_image).y0 = 0;
        (*opj_image).x1 = width;
        (*opj_image).y1 = height;

        for y in 0..height {
            for x in 0..width {
                let pixel = view.get_pixel(x, y);
                let index = (y * width + x) as isize;
                *(*(*opj_image).comps.offset(0)).data.offset(index) = pixel.r() as i32;
                *(*(*opj_image).comps.offset(1)).data.offset(index) = pixel.g() as i32;
                *(*(*opj_image).comps.offset(2)).data.offset(index) = pixel.b() as i32;
            }
        }

        let mut cparams: opj_cparameters_t = std::mem::zeroed();
        opj_set_default_encoder_parameters(&mut cparams);
        cparams.cod_format = OPJ_CODEC_JP2 as i32;
        cparams.tcp_numlayers = 1;
        cparams.cp_disto_alloc = 1;
        // original bit depth is 24 bpp (3 x 8-bit components); openjp2 expresses quality as a
        // compression ratio against that figure rather than an absolute bits/pixel rate.
        cparams.tcp_rates[0] = 24.0 / params.rate;
        cparams.irreversible = 1;

        if let Some(roi) = &params.roi {
            let _ = roi.align; // no spatial-alignment equivalent in this encoder, see doc comment above
            cparams.roi_compno = 0;
            let level = roi.start_level.min(3) as i32;
            cparams.roi_shift = (MAX_ROI_SHIFT - level * (MAX_ROI_SHIFT / 4)).clamp(0, MAX_ROI_SHIFT);
        } else {
            cparams.roi_compno = -1;
        }

        let codec = opj_create_compress(OPJ_CODEC_JP2);
        if codec.is_null() {
            opj_image_destroy(opj_image);
            return Err(Jp2Error::CodecSetup.into());
        }

        if opj_setup_encoder(codec, &mut cparams, opj_image) == 0 {
            opj_destroy_codec(codec);
            opj_image_destroy(opj_image);
            return Err(Jp2Error::CodecSetup.into());
        }

        // openjp2's compressor writes through an opj_stream_t bound to a sink; this adapter binds
        // it to a scratch file rather than a growable memory buffer, then reads the bytes back.
        let out_path = scratch_path();
        let out_path_c = CString::new(out_path.to_string_lossy().as_bytes()).expect("scratch path has no interior nul");
        let stream = opj_stream_create_default_file_stream(out_path_c.as_ptr() as *mut _, 0);
        if stream.is_null() {
            opj_destroy_codec(codec);
            opj_image_destroy(opj_image);
            return Err(Jp2Error::Compression.into());
        }

        let ok = opj_start_compress(codec, opj_image, stream) != 0
            && opj_encode(codec, stream) != 0
            && opj_end_compress(codec, stream) != 0;

        opj_stream_destroy(stream);
        opj_destroy_codec(codec);
        opj_image_destroy(opj_image);

        let bytes = if ok { std::fs::read(&out_path).unwrap_or_default() } else { Vec::new() };
        let _ = std::fs::remove_file(&out_path);

        ensure!(ok, "{}", Jp2Error::Compression);
        Ok(bytes)
    }
}

/// A process-unique scratch file path for one encode attempt's output stream.
fn scratch_path() -> std::path::PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pivcard-jp2-{}-{n}.jp2", std::process::id()))
}
