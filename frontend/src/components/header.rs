use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-recycle"></i> {" Waste Segmentation using YOLOv8"}</h1>
            <p class="subtitle">{"Upload an image to visualize segmentation and predicted waste types."}</p>
        </header>
    }
}

pub fn render_footer() -> Html {
    html! {
        <footer class="app-footer">
            <small>{"Developed using "}<b>{"YOLOv8"}</b>{" & "}<b>{"Yew"}</b>{" | Powered by Abhilash & Tazrian"}</small>
        </footer>
    }
}
