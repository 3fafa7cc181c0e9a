//! Pagination – splits the layout tree into page bands.
//!
//! Handles:
//! - Consecutive page bands of one printable height each
//! - Text runs split at line boundaries into continuation siblings
//! - Unsplittable blocks moved to the next page
//! - `page-break-before` / `page-break-after` and `break-inside: avoid`
//!
//! Every move shifts the following siblings and grows the ancestors, so the
//! tree stays consistent after pagination.

use std::collections::HashSet;

use log::debug;

use crate::error::{RenderError, Result};
use crate::layout::{LayoutBox, LayoutNode, TextLine};
use crate::options::PageGeometry;
use crate::style::{Display, FlexDirection};

const EPS: f32 = 0.01;

/// One page: a band of the layout tree and the nodes that appear in it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFragment {
    /// 1-based.
    pub page_number: usize,
    pub y_start: f32,
    pub y_end: f32,
    /// Ids of participating nodes, in document order.
    pub node_ids: Vec<usize>,
}

impl PageFragment {
    pub fn node_set(&self) -> HashSet<usize> {
        self.node_ids.iter().copied().collect()
    }

    pub fn height(&self) -> f32 {
        self.y_end - self.y_start
    }
}

/// A paginated layout ready for the renderers.
#[derive(Debug, Clone)]
pub struct PagedDocument {
    pub root: LayoutNode,
    pub pages: Vec<PageFragment>,
    pub geometry: PageGeometry,
}

impl PagedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Break `root` into pages of `page_height` layout px. The tree is modified
/// in place: straddling text is split and moved nodes are translated.
pub fn paginate(root: &mut LayoutNode, page_height: f32, max_pages: usize) -> Result<Vec<PageFragment>> {
    if !page_height.is_finite() || page_height <= 0.0 {
        return Err(RenderError::InvalidInput(format!(
            "page height must be positive, got {page_height}"
        )));
    }

    let mut next_id = 0;
    root.walk(&mut |n| next_id = next_id.max(n.id));
    let mut pager = Paginator {
        page_height,
        next_id: next_id + 1,
        splits: 0,
    };
    let growth = pager.paginate_children(root);
    root.content.height += growth;

    let bottom = root.max_bottom().max(0.0);
    let count = ((bottom / page_height - EPS / page_height).ceil() as usize).max(1);
    if count > max_pages {
        return Err(RenderError::ResourceLimit(format!(
            "document needs {count} pages, limit is {max_pages}"
        )));
    }

    let mut pages: Vec<PageFragment> = (0..count)
        .map(|k| PageFragment {
            page_number: k + 1,
            y_start: k as f32 * page_height,
            y_end: (k + 1) as f32 * page_height,
            node_ids: Vec::new(),
        })
        .collect();
    assign_nodes(root, page_height, &mut pages);

    debug!("paginated into {} page(s), {} split(s)", count, pager.splits);
    Ok(pages)
}

fn assign_nodes(node: &LayoutNode, page_height: f32, pages: &mut [PageFragment]) {
    let extent = node_extent(node);
    let last_page = pages.len() - 1;
    let first = page_index(extent.y, page_height).min(last_page);
    let bottom = extent.bottom();
    let last = page_index((bottom - tolerance(bottom)).max(extent.y), page_height)
        .max(first)
        .min(last_page);
    for page in &mut pages[first..=last] {
        page.node_ids.push(node.id);
    }
    for child in &node.children {
        assign_nodes(child, page_height, pages);
    }
}

/// Area a node paints: its border box, or its lines for text.
fn node_extent(node: &LayoutNode) -> LayoutBox {
    if node.is_text() && !node.lines.is_empty() {
        let mut bbox = LayoutBox::new(node.lines[0].x, node.lines[0].y, 0.0, 0.0);
        for l in &node.lines {
            bbox = bbox.union(&LayoutBox::new(l.x, l.y, l.width, l.height));
        }
        return bbox;
    }
    node.border_box()
}

fn page_index(y: f32, page_height: f32) -> usize {
    if y <= 0.0 {
        0
    } else {
        ((y + tolerance(y)) / page_height).floor() as usize
    }
}

struct Paginator {
    page_height: f32,
    next_id: usize,
    splits: usize,
}

impl Paginator {
    /// Index of the page band containing `y`. A position within tolerance
    /// of a boundary belongs to the page that starts there.
    fn page_of(&self, y: f32) -> usize {
        let y = y.max(0.0);
        let tol = tolerance(y);
        let mut k = (y / self.page_height).floor() as usize;
        if k as f32 * self.page_height > y + tol {
            k = k.saturating_sub(1);
        }
        if (k + 1) as f32 * self.page_height - y <= tol {
            k += 1;
        }
        k
    }

    fn page_top(&self, y: f32) -> f32 {
        self.page_of(y) as f32 * self.page_height
    }

    fn next_boundary(&self, y: f32) -> f32 {
        (self.page_of(y) + 1) as f32 * self.page_height
    }

    fn at_page_top(&self, y: f32) -> bool {
        y - self.page_top(y) < tolerance(y)
    }

    fn crosses_boundary(&self, top: f32, bottom: f32) -> bool {
        let boundary = self.next_boundary(top);
        bottom > boundary + tolerance(boundary)
    }

    /// Paginate the children of `parent`; returns how much they grew.
    fn paginate_children(&mut self, parent: &mut LayoutNode) -> f32 {
        if is_row(parent) {
            return self.paginate_row(parent);
        }

        let mut shift = 0.0f32;
        let mut next_to_shift = 0;
        let mut pending_break = false;
        let mut i = 0;

        while i < parent.children.len() {
            let child = &mut parent.children[i];
            if child.is_out_of_flow() {
                i += 1;
                next_to_shift = next_to_shift.max(i);
                continue;
            }
            if i >= next_to_shift {
                if shift != 0.0 {
                    child.translate(0.0, shift);
                }
                next_to_shift = i + 1;
            }

            if child.is_text() {
                match self.split_text(child) {
                    TextSplit::Fits => {}
                    TextSplit::Moved(delta) if delta > EPS => {
                        shift += delta;
                        // Re-examine: the run may straddle the following page too.
                        continue;
                    }
                    TextSplit::Moved(delta) => shift += delta,
                    TextSplit::Split(continuation, delta) => {
                        shift += delta;
                        parent.children.insert(i + 1, *continuation);
                        next_to_shift = i + 2;
                    }
                }
                i += 1;
                continue;
            }

            let block = child.is_block_level();
            if block && (child.style.page_break_before || pending_break) {
                let top = child.margin_box().y;
                if top > EPS && !self.at_page_top(top) {
                    let delta = self.next_boundary(top) - top;
                    child.translate(0.0, delta);
                    shift += delta;
                }
            }
            pending_break = false;

            shift += self.place_element(child);

            if block && child.style.page_break_after {
                pending_break = parent.children[i + 1..].iter().any(|c| !c.is_out_of_flow());
            }
            i += 1;
        }
        shift
    }

    /// Side-by-side children are paginated independently; the row grows by
    /// the largest growth among them.
    fn paginate_row(&mut self, parent: &mut LayoutNode) -> f32 {
        let mut growth = 0.0f32;
        for child in &mut parent.children {
            if child.is_out_of_flow() || child.is_text() {
                continue;
            }
            growth = growth.max(self.place_element(child));
        }
        growth
    }

    /// Move an unsplittable straddling block to the next page, then paginate
    /// inside it. Returns how far everything after it must shift.
    fn place_element(&mut self, child: &mut LayoutNode) -> f32 {
        let mut delta = 0.0;
        if child.is_block_level() {
            let mb = child.margin_box();
            let straddles = self.crosses_boundary(mb.y, mb.bottom());
            let avoid = child.style.page_break_inside_avoid && mb.height <= self.page_height;
            let unsplittable = child.image.is_some() || !has_in_flow_children(child);
            if straddles && (avoid || unsplittable) && !self.at_page_top(mb.y) {
                delta = self.next_boundary(mb.y) - mb.y;
                child.translate(0.0, delta);
            }
        }
        // Atomic inline boxes are never broken.
        let splittable = child.is_block_level() || child.style.display == Display::Inline;
        if splittable && child.image.is_none() {
            let growth = self.paginate_children(child);
            if growth > 0.0 {
                child.content.height += growth;
                delta += growth;
            }
        }
        delta
    }

    /// Split a text run at the first line that crosses a page boundary.
    fn split_text(&mut self, node: &mut LayoutNode) -> TextSplit {
        let Some(first) = node.lines.first() else {
            return TextSplit::Fits;
        };
        let first_top = first.y;
        let boundary = self.next_boundary(first_top);
        let limit = boundary + tolerance(boundary);
        let Some(mut k) = node.lines.iter().position(|l| l.bottom() > limit) else {
            return TextSplit::Fits;
        };

        if k == 0 {
            if !self.at_page_top(first_top) {
                let delta = boundary - first_top;
                node.translate(0.0, delta);
                return TextSplit::Moved(delta);
            }
            // A line taller than a page stays; continue after it.
            if node.lines.len() == 1 {
                return TextSplit::Fits;
            }
            k = 1;
        }

        let tail = node.lines.split_off(k);
        node.content = lines_bbox(&node.lines);

        let mut continuation = node.clone();
        continuation.id = self.next_id;
        self.next_id += 1;
        self.splits += 1;
        continuation.lines = tail;
        continuation.content = lines_bbox(&continuation.lines);

        let start = continuation.content.y;
        let target = if self.at_page_top(start) {
            start
        } else {
            self.next_boundary(start)
        };
        let delta = target - start;
        continuation.translate(0.0, delta);
        TextSplit::Split(Box::new(continuation), delta)
    }
}

enum TextSplit {
    Fits,
    Moved(f32),
    Split(Box<LayoutNode>, f32),
}

/// Comparison slack at `y`; grows with magnitude so f32 rounding on deep
/// pages never reads as a boundary crossing.
fn tolerance(y: f32) -> f32 {
    EPS.max(y.abs() * 4.0 * f32::EPSILON)
}

fn is_row(node: &LayoutNode) -> bool {
    node.style.display == Display::TableRow
        || (node.style.display == Display::Flex && node.style.flex_direction == FlexDirection::Row)
}

fn has_in_flow_children(node: &LayoutNode) -> bool {
    node.children.iter().any(|c| !c.is_out_of_flow())
}

fn lines_bbox(lines: &[TextLine]) -> LayoutBox {
    let Some(first) = lines.first() else {
        return LayoutBox::default();
    };
    let mut bbox = LayoutBox::new(first.x, first.y, first.width, first.height);
    for l in &lines[1..] {
        bbox = bbox.union(&LayoutBox::new(l.x, l.y, l.width, l.height));
    }
    bbox
}

/// Lay out and paginate in one step for a given page geometry.
pub fn paginate_document(mut root: LayoutNode, geometry: PageGeometry, max_pages: usize) -> Result<PagedDocument> {
    let pages = paginate(&mut root, geometry.layout_page_height, max_pages)?;
    Ok(PagedDocument {
        root,
        pages,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{build_styled_tree, collect_stylesheets};
    use crate::dom::{parse_markup, ParseLimits};
    use crate::error::Warnings;
    use crate::layout::{compute_layout, Viewport};

    const PAGE: f32 = 200.0;

    fn layout(html: &str) -> LayoutNode {
        let doc = parse_markup(html, &ParseLimits::default()).unwrap().document;
        let rules = collect_stylesheets(&doc);
        let styled = build_styled_tree(&doc, &rules);
        let mut warnings = Warnings::new();
        compute_layout(
            &styled,
            Viewport {
                width: 400.0,
                height: PAGE,
            },
            &mut warnings,
        )
    }

    fn lines(root: &LayoutNode) -> Vec<(String, f32, f32)> {
        let mut out = Vec::new();
        root.walk(&mut |n| {
            for l in &n.lines {
                out.push((l.text.clone(), l.y, l.bottom()));
            }
        });
        out
    }

    #[test]
    fn single_page() {
        let mut root = layout("<p>Short text</p>");
        let pages = paginate(&mut root, PAGE, 10).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].node_ids.contains(&root.id));
    }

    #[test]
    fn empty_document_has_one_page() {
        let mut root = layout("");
        let pages = paginate(&mut root, PAGE, 10).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn multiple_pages() {
        let mut html = String::new();
        for i in 0..60 {
            html.push_str(&format!("<p>Paragraph {i} with some text</p>"));
        }
        let mut root = layout(&html);
        let pages = paginate(&mut root, PAGE, 100).unwrap();
        assert!(pages.len() > 1, "expected multiple pages, got {}", pages.len());
    }

    #[test]
    fn text_is_split_without_losing_lines() {
        // 19.2px lines; 30 of them do not fit in 200px.
        let text = (0..30).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let mut root = layout(&format!("<pre>{text}</pre>"));
        let before = lines(&root).len();
        let pages = paginate(&mut root, PAGE, 100).unwrap();
        let after = lines(&root);
        assert_eq!(before, after.len());
        assert!(pages.len() >= 3);
        // No line crosses a page boundary.
        for (text, top, bottom) in &after {
            let page = (top / PAGE).floor();
            assert!(*bottom <= (page + 1.0) * PAGE + 0.01, "{text} straddles");
        }
        // The continuation is a sibling right after the original.
        let pre = &root.children[0];
        assert!(pre.children.len() >= 3);
        assert!(pre.children.iter().all(LayoutNode::is_text));
        assert!(pre.content.height > 30.0 * 19.2);
    }

    #[test]
    fn unsplittable_block_moves_and_shifts_siblings() {
        let mut root = layout(
            "<div style='height:150px'></div>\
             <div style='height:100px'></div>\
             <div style='height:10px'></div>",
        );
        let pages = paginate(&mut root, PAGE, 10).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(root.children[1].content.y, 200.0);
        assert_eq!(root.children[2].content.y, 300.0);
        assert_eq!(root.content.height, 310.0);
    }

    #[test]
    fn forced_breaks() {
        let mut root = layout(
            "<div style='height:10px'></div>\
             <div style='height:10px;page-break-before:always'></div>\
             <div style='height:10px;break-after:page'></div>\
             <div style='height:10px'></div>",
        );
        let pages = paginate(&mut root, PAGE, 10).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(root.children[1].content.y, 200.0);
        assert_eq!(root.children[3].content.y, 400.0);
    }

    #[test]
    fn trailing_break_after_adds_no_page() {
        let mut root = layout("<div style='height:10px;page-break-after:always'></div>");
        assert_eq!(paginate(&mut root, PAGE, 10).unwrap().len(), 1);
    }

    #[test]
    fn max_pages_is_enforced() {
        let mut root = layout("<div style='height:5000px'></div>");
        let err = paginate(&mut root, PAGE, 3).unwrap_err();
        assert!(matches!(err, RenderError::ResourceLimit(_)));
    }

    #[test]
    fn page_count_grows_with_content() {
        let mut last = 0;
        for n in [1, 10, 40, 80] {
            let html: String = (0..n).map(|i| format!("<p>Item {i}</p>")).collect();
            let mut root = layout(&html);
            let count = paginate(&mut root, PAGE, 1000).unwrap().len();
            assert!(count >= last);
            last = count;
        }
        assert!(last > 1);
    }

    #[test]
    fn fragments_list_nodes_in_their_band() {
        let mut root = layout(
            "<div id=a style='height:150px'></div><div id=b style='height:100px'></div>",
        );
        let pages = paginate(&mut root, PAGE, 10).unwrap();
        let a = root.children[0].id;
        let b = root.children[1].id;
        assert!(pages[0].node_set().contains(&a));
        assert!(!pages[0].node_set().contains(&b));
        assert!(pages[1].node_set().contains(&b));
    }

    #[test]
    fn band_lookup_is_stable_at_deep_boundaries() {
        // A4 printable height in layout px; f32 rounding misplaces some
        // k * h products past page 126.
        let pager = Paginator {
            page_height: 1046.9292,
            next_id: 0,
            splits: 0,
        };
        for k in 1..3000usize {
            let boundary = k as f32 * pager.page_height;
            assert_eq!(pager.page_of(boundary), k, "boundary {k}");
            assert!(pager.at_page_top(boundary), "boundary {k}");
            assert!(pager.next_boundary(boundary) - boundary > EPS, "boundary {k}");
        }
    }

    #[test]
    fn text_at_a_deep_boundary_makes_progress() {
        let page = 1046.9292f32;
        let mut root = layout("<p>one two three</p>");
        let node = &mut root.children[0].children[0];
        assert!(node.is_text());
        let y = node.lines[0].y;
        node.translate(0.0, 127.0 * page - y - 5.0);
        let mut pager = Paginator {
            page_height: page,
            next_id: 1000,
            splits: 0,
        };
        let mut moves = 0;
        while let TextSplit::Moved(delta) = pager.split_text(node) {
            assert!(delta > EPS);
            moves += 1;
            assert!(moves < 3, "text run keeps moving without advancing");
        }
        assert!(pager.at_page_top(node.lines[0].y));
    }

    #[test]
    fn thousands_of_paragraphs_paginate() {
        let html: String = (0..8000)
            .map(|i| format!("<p>Paragraph {i} with a little filler text.</p>"))
            .collect();
        let mut root = layout(&html);
        let before = lines(&root).len();
        let pages = paginate(&mut root, 1046.9292, 100_000).unwrap();
        assert_eq!(lines(&root).len(), before);
        assert!(pages.len() > 126);
        let last = pages.last().unwrap();
        assert_eq!(last.page_number, pages.len());
        assert!(!last.node_ids.is_empty());
    }
}
