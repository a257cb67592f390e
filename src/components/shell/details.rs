//! Detail panel for the hovered entity.

use leptos::ev;
use leptos::prelude::*;

use crate::components::force_graph::{EngineHandle, NodeDetails};

/// Shows the hovered node's details. While the pointer is inside the panel
/// the hover emphasis is held, so the user can read and pin without it
/// clearing underneath.
#[component]
pub fn DetailPanel(
	#[prop(into)] details: Signal<Option<NodeDetails>>,
	engine: StoredValue<EngineHandle, LocalStorage>,
) -> impl IntoView {
	let hold = move |_: ev::MouseEvent| {
		engine.with_value(|h| h.with(|e| e.hold_hover()));
	};
	let release = move |_: ev::MouseEvent| {
		engine.with_value(|h| h.with(|e| e.release_hover()));
	};

	move || {
		details.get().map(|d| {
			let id = d.id.clone();
			let toggle_pin = move |_: ev::MouseEvent| {
				engine.with_value(|h| h.with(|e| e.toggle_node_pin(&id)));
			};
			let connections = if d.neighbors.is_empty() {
				"No connections".to_string()
			} else {
				d.neighbors.join(", ")
			};
			view! {
				<div
					class="story-graph-details"
					style="position: absolute; top: 12px; right: 12px; max-width: 280px;"
					on:mouseenter=hold
					on:mouseleave=release
				>
					<h3>{d.label.clone()}</h3>
					<p class="story-graph-muted">
						{format!("{} · {} connections · {}", d.kind, d.degree, d.tier.label())}
					</p>
					{d.description.clone().map(|text| view! { <p>{text}</p> })}
					{(!d.groups.is_empty()).then(|| view! {
						<p class="story-graph-groups">"Groups: " {d.groups.join(", ")}</p>
					})}
					<p class="story-graph-neighbors">{connections}</p>
					{d.file_path.clone().map(|path| view! {
						<p class="story-graph-path story-graph-muted">{path}</p>
					})}
					<button on:click=toggle_pin>
						{if d.pinned { "Unpin" } else { "Pin" }}
					</button>
				</div>
			}
		})
	}
}
