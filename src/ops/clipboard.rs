// ---------------------------------------------------------------------------
//  System clipboard helpers (OS-level copy via arboard)
// ---------------------------------------------------------------------------

use image::RgbaImage;

/// Write an RGBA image to the system clipboard.  Returns whether the copy
/// was accepted; clipboard errors are non-fatal.
pub fn copy_to_system_clipboard(img: &RgbaImage) -> bool {
    // arboard wants ImageData { width, height, bytes: Cow<[u8]> } in RGBA order.
    match arboard::Clipboard::new() {
        Ok(mut clip) => {
            let data = arboard::ImageData {
                width: img.width() as usize,
                height: img.height() as usize,
                bytes: std::borrow::Cow::Borrowed(img.as_raw()),
            };
            clip.set_image(data).is_ok()
        }
        Err(e) => {
            crate::log_warn!("Clipboard unavailable: {}", e);
            false
        }
    }
}
