//! OpenCV HighGUI window that draws the recognition overlay.

use crate::session::{Display, Overlay};
use facewatch_hw::Frame;
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::{highgui, imgproc, prelude::*};
use thiserror::Error;

const Q_KEY_CODE: i32 = 113;

/// Height of the filled label bar along the bottom of each face box.
const LABEL_BAR_HEIGHT: i32 = 35;
const BOX_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("frame buffer too short for {width}x{height}: got {actual} bytes")]
    InvalidFrame { width: u32, height: u32, actual: usize },
}

fn box_color() -> Scalar {
    Scalar::new(0.0, 0.0, 225.0, 0.0)
}

fn text_color() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

pub struct OpenCvWindow {
    name: String,
}

impl OpenCvWindow {
    pub fn create(name: &str) -> Result<Self, DisplayError> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        tracing::debug!(window = name, "display window created");
        Ok(Self { name: name.to_owned() })
    }

    fn to_mat(frame: &Frame) -> Result<Mat, DisplayError> {
        let expected = frame.width as usize * frame.height as usize * 3;
        if frame.data.len() < expected {
            return Err(DisplayError::InvalidFrame {
                width: frame.width,
                height: frame.height,
                actual: frame.data.len(),
            });
        }

        let mut mat = Mat::new_rows_cols_with_default(
            frame.height as i32,
            frame.width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(&frame.data[..expected]);
        Ok(mat)
    }

    fn draw_overlay(mat: &mut Mat, overlay: &Overlay) -> Result<(), DisplayError> {
        imgproc::put_text(
            mat,
            &format!("FPS: {:.2}", overlay.fps),
            Point::new(mat.cols() - 100, 20),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            text_color(),
            1,
            imgproc::LINE_AA,
            false,
        )?;

        for labelled in &overlay.boxes {
            let r = labelled.region;
            imgproc::rectangle(
                mat,
                Rect::new(r.left, r.top, r.width(), r.height()),
                box_color(),
                BOX_THICKNESS,
                imgproc::LINE_8,
                0,
            )?;
            imgproc::rectangle(
                mat,
                Rect::new(r.left, r.bottom - LABEL_BAR_HEIGHT, r.width(), LABEL_BAR_HEIGHT),
                box_color(),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )?;
            imgproc::put_text(
                mat,
                &labelled.label,
                Point::new(r.left + 6, r.bottom - 6),
                imgproc::FONT_HERSHEY_DUPLEX,
                0.8,
                text_color(),
                1,
                imgproc::LINE_8,
                false,
            )?;
        }

        Ok(())
    }
}

impl Display for OpenCvWindow {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<(), DisplayError> {
        let mut mat = Self::to_mat(frame)?;
        Self::draw_overlay(&mut mat, overlay)?;
        highgui::imshow(&self.name, &mat)?;
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        Ok(highgui::wait_key(1)? == Q_KEY_CODE)
    }
}

impl Drop for OpenCvWindow {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.name);
    }
}
