mod api;
mod components;

use components::header::{render_footer, render_header};
use components::results::render_results;
use components::upload_section::render_upload_section;
use components::utils::{first_upload, render_error_message};
use gloo_file::File as GlooFile;
use shared::SegmentationResponse;
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

// Yew msg components
pub enum Msg {
    FileSelected(GlooFile),
    SegmentationResult(SegmentationResponse),
    SetError(Option<String>),
    SetDragging(bool),
    HandleDrop(DragEvent),
}

// Main component
pub struct Model {
    file_name: Option<String>,
    result: Option<SegmentationResponse>,
    loading: bool,
    error: Option<String>,
    is_dragging: bool,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            file_name: None,
            result: None,
            loading: false,
            error: None,
            is_dragging: false,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::FileSelected(file) => self.handle_file_selected(ctx, file),
            Msg::SegmentationResult(response) => {
                log::info!(
                    "Segmented {} -> [{}]",
                    response.file_name,
                    response.summary
                );
                self.result = Some(response);
                self.loading = false;
                true
            }
            Msg::SetError(error) => {
                if let Some(message) = &error {
                    log::error!("{}", message);
                }
                self.error = error;
                self.loading = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => self.handle_drop(ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header() }

                <main class="main-content">
                { render_upload_section(self, ctx) }
                { render_error_message(self) }
                { render_results(self) }
                </main>

                { render_footer() }
            </div>
        }
    }
}

impl Model {
    fn handle_file_selected(&mut self, ctx: &Context<Self>, file: GlooFile) -> bool {
        if self.loading {
            return false;
        }

        self.file_name = Some(file.name());
        self.result = None;
        self.error = None;
        self.loading = true;

        let link = ctx.link().clone();
        spawn_local(async move {
            match api::send_segmentation_request(&file).await {
                Ok(response) => link.send_message(Msg::SegmentationResult(response)),
                Err(message) => link.send_message(Msg::SetError(Some(message))),
            }
        });

        true
    }

    fn handle_drop(&mut self, ctx: &Context<Self>, event: DragEvent) -> bool {
        event.prevent_default();
        self.is_dragging = false;

        if let Some(file_list) = event.data_transfer().and_then(|dt| dt.files()) {
            match first_upload(&file_list) {
                Ok(file) => ctx.link().send_message(Msg::FileSelected(file)),
                Err(message) => ctx.link().send_message(Msg::SetError(Some(message))),
            }
        }

        true
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
