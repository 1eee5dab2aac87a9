use std::{panic::catch_unwind, sync::OnceLock};

use anyhow::anyhow;
use image::ImageBuffer;

use crate::config;

use super::Image;

#[derive(Debug, Clone, Copy)]
enum JpegBackend {
    /// The `jpeg-decoder` crate: pure Rust, robust, slow.
    JpegDecoder,
    /// The `mozjpeg` crate, wrapping Mozilla's libjpeg fork. Fast, but C.
    MozJpeg,
}

fn backend() -> JpegBackend {
    static BACKEND: OnceLock<JpegBackend> = OnceLock::new();
    *BACKEND.get_or_init(|| {
        let backend = config::parsed_var(config::JPEG_BACKEND_VAR, JpegBackend::MozJpeg, |v| {
            match v {
                "mozjpeg" => Some(JpegBackend::MozJpeg),
                "jpeg-decoder" => Some(JpegBackend::JpegDecoder),
                _ => None,
            }
        });
        log::debug!("using JPEG decode backend: {:?}", backend);
        backend
    })
}

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match backend() {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::MozJpeg => {
            // mozjpeg reports decoding errors by unwinding
            let (buf, width, height) = catch_unwind(|| -> anyhow::Result<_> {
                let mut decompress = mozjpeg::Decompress::new_mem(data)?;

                decompress.do_fancy_upsampling(false);
                decompress.dct_method(mozjpeg::DctMethod::IntegerFast);

                let mut decompress = decompress.rgba()?;
                let buf = decompress
                    .read_scanlines_flat()
                    .ok_or_else(|| anyhow!("failed to decode image"))?;
                Ok((buf, decompress.width(), decompress.height()))
            })
            .map_err(|payload| match payload.downcast::<String>() {
                Ok(string) => anyhow::Error::msg(string),
                Err(_) => anyhow!("<unknown panic message>"),
            })??;

            ImageBuffer::from_raw(u32::try_from(width)?, u32::try_from(height)?, buf)
                .ok_or_else(|| anyhow!("decoded JPEG data does not match its {width}x{height} size"))?
        }
    };

    Ok(Image { buf })
}
