use super::super::Model;
use shared::{MISSING_ANNOTATION_WARNING, SegmentationResponse};
use yew::prelude::*;

pub fn render_results(model: &Model) -> Html {
    if model.loading {
        return html! {
            <div class="loading">
                <i class="fa-solid fa-spinner fa-spin fa-2x"></i>
                <p>{"Running YOLOv8 segmentation..."}</p>
            </div>
        };
    }

    match &model.result {
        Some(result) => html! {
            <div class="results-container">
                <hr />
                <h2><i class="fa-solid fa-magnifying-glass"></i>{" Segmentation Result"}</h2>
                <div class="side-by-side">
                    <div class="result-column">
                        <h4>{"Uploaded Image"}</h4>
                        <figure>
                            <img src={result.original_url.clone()} alt="Original Waste Image" />
                            <figcaption>{"Original Waste Image"}</figcaption>
                        </figure>
                    </div>
                    <div class="result-column">
                        <h4>{"Segmented Output"}</h4>
                        { render_annotated(result) }
                    </div>
                </div>
                <hr />
                <h3>{"Model Prediction"}</h3>
                <div class="success-banner">
                    <strong>{"Detected Waste Type(s): "}</strong>
                    { &result.summary }
                </div>
            </div>
        },
        None => html! {},
    }
}

fn render_annotated(result: &SegmentationResponse) -> Html {
    match (&result.annotated_url, &result.warning) {
        (Some(url), _) => html! {
            <figure>
                <img src={url.clone()} alt="YOLOv8 Segmentation Result" />
                <figcaption>{"YOLOv8 Segmentation Result"}</figcaption>
            </figure>
        },
        (None, warning) => html! {
            <div class="warning-message">
                <i class="fa-solid fa-triangle-exclamation"></i>
                <p>{ warning.as_deref().unwrap_or(MISSING_ANNOTATION_WARNING) }</p>
            </div>
        },
    }
}
