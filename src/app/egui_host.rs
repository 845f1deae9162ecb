use egui_winit::winit::event::WindowEvent;
use winit::window::Window;

/// Tessellated egui output handed to the renderer for one frame.
pub struct EguiFrameOutput {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// Owns the egui context and its winit glue for the debug panel.
pub struct EguiHost {
    context: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiHost {
    pub fn new(window: &Window, max_texture_side: usize) -> Self {
        let context = egui::Context::default();
        let winit_state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            Some(max_texture_side),
        );
        Self {
            context,
            winit_state,
        }
    }

    /// Feeds a window event to egui. Returns true when egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    /// True while the pointer is over a panel or dragging a widget.
    pub fn wants_pointer(&self) -> bool {
        self.context.wants_pointer_input() || self.context.is_pointer_over_area()
    }

    pub fn wants_keyboard(&self) -> bool {
        self.context.wants_keyboard_input()
    }

    pub fn run<F>(&mut self, window: &Window, build: F) -> EguiFrameOutput
    where
        F: FnMut(&egui::Context),
    {
        let raw_input = self.winit_state.take_egui_input(window);
        let output = self.context.run(raw_input, build);
        self.winit_state
            .handle_platform_output(window, output.platform_output);
        let pixels_per_point = output.pixels_per_point;
        EguiFrameOutput {
            clipped_primitives: self.context.tessellate(output.shapes, pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point,
        }
    }
}
