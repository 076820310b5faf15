use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::TextureStore;

use super::raster::{rasterize, FrameTarget};
use super::DrawList;

/// Software renderer presenting a [`DrawList`] through a `pixels` surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    textures: TextureStore,
}

impl Renderer {
    pub fn new(window: Arc<Window>, textures: TextureStore) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            textures,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    fn build_pixels(window: Arc<Window>, width: u32, height: u32) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        Pixels::new(width.max(1), height.max(1), surface)
    }

    pub fn render(&mut self, draw_list: &DrawList) -> Result<(), Error> {
        let (width, height) = (self.width.max(1), self.height.max(1));
        {
            let mut target = FrameTarget::new(self.pixels.frame_mut(), width, height);
            rasterize(&mut target, draw_list, &self.textures);
        }
        self.pixels.render()
    }
}
