use std::io::BufRead;

use image::codecs::pnm::PnmDecoder;
use image::DynamicImage;

use crate::SourceError;

/// Reader for a concatenated stream of PNM images, the format
/// `ffmpeg -f image2pipe -vcodec ppm` writes. Each image is decoded in place,
/// leaving the reader on the first byte of the next one.
pub(crate) struct PnmStream<R> {
    reader: R,
}

impl<R: BufRead> PnmStream<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Returns the next image, or `None` when the stream ends cleanly between
    /// images.
    pub(crate) fn next_image(&mut self) -> Result<Option<DynamicImage>, SourceError> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let decoder = PnmDecoder::new(&mut self.reader)?;
        Ok(Some(DynamicImage::from_decoder(decoder)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(width: u32, height: u32, fill: u8) -> Vec<u8> {
        let mut buf = format!("P6\n{width} {height}\n255\n").into_bytes();
        buf.extend(std::iter::repeat(fill).take((width * height * 3) as usize));
        buf
    }

    #[test]
    fn reads_consecutive_images() {
        let mut data = frame(2, 2, 10);
        data.extend(frame(3, 1, 200));
        let mut stream = PnmStream::new(Cursor::new(data));

        let first = stream.next_image().unwrap().unwrap().to_rgb8();
        assert_eq!(first.dimensions(), (2, 2));
        assert_eq!(first.get_pixel(1, 1).0, [10, 10, 10]);

        let second = stream.next_image().unwrap().unwrap().to_rgb8();
        assert_eq!(second.dimensions(), (3, 1));
        assert_eq!(second.get_pixel(2, 0).0, [200, 200, 200]);

        assert!(stream.next_image().unwrap().is_none());
    }

    #[test]
    fn skips_header_comments() {
        let mut data = b"P6 # written by a test\n1 # width done\n1\n255\n".to_vec();
        // Pixel bytes that look like whitespace must still be read as data.
        data.extend([b'\n', b' ', b'#']);
        let image = PnmStream::new(Cursor::new(data)).next_image().unwrap().unwrap().to_rgb8();
        assert_eq!(image.get_pixel(0, 0).0, [b'\n', b' ', b'#']);
    }

    #[test]
    fn small_maxval_is_rescaled() {
        let mut data = b"P6\n2 1\n15\n".to_vec();
        data.extend([15, 15, 15, 0, 5, 15]);
        let image = PnmStream::new(Cursor::new(data)).next_image().unwrap().unwrap().to_rgb8();
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 85, 255]);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut data = frame(4, 4, 0);
        data.truncate(data.len() - 5);
        let err = PnmStream::new(Cursor::new(data)).next_image().unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn rejects_unknown_magic() {
        let err = PnmStream::new(Cursor::new(b"Q6\n1 1\n255\n\0\0\0".to_vec()))
            .next_image()
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn empty_stream_ends_cleanly() {
        assert!(PnmStream::new(Cursor::new(Vec::new())).next_image().unwrap().is_none());
    }
}
