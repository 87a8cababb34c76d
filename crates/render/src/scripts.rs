//! Functions evaluated inside the page with a slide element bound to `this`.
//!
//! Each returns a JSON string; object results do not survive the CDP
//! boundary without `returnByValue`, strings always do.

/// The element's viewport box, or `null` when it has no layout box.
pub const ELEMENT_BOUNDS: &str = r#"function () {
    const r = this.getBoundingClientRect();
    if (r.width === 0 && r.height === 0) {
        return JSON.stringify(null);
    }
    return JSON.stringify({ x: r.x, y: r.y, w: r.width, h: r.height });
}"#;

/// Background and border boxes under the slide.
///
/// Args: slide selector, accent class, section class.
pub const SLIDE_SHAPES: &str = r#"function (slideSelector, accentClass, sectionClass) {
    const results = [];
    const slideRect = this.getBoundingClientRect();
    const sides = ['Top', 'Right', 'Bottom', 'Left'];

    for (const el of this.querySelectorAll('*')) {
        if (el.matches(slideSelector)) continue;

        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        if (rect.width < 1 || rect.height < 1) continue;
        if (style.display === 'none' || style.visibility === 'hidden') continue;

        const bg = style.backgroundColor;
        const hasBg = bg !== 'rgba(0, 0, 0, 0)' && bg !== 'transparent';

        let borderWidth = 0;
        let borderColor = '';
        for (const side of sides) {
            const width = parseFloat(style['border' + side + 'Width']) || 0;
            const color = style['border' + side + 'Color'];
            if (width > 0 && style['border' + side + 'Style'] !== 'none' && color !== 'rgba(0, 0, 0, 0)') {
                borderWidth = width;
                borderColor = color;
                break;
            }
        }

        const isAccent = el.classList.contains(accentClass);
        const isSection = el.classList.contains(sectionClass);
        if (!(hasBg || borderWidth > 0 || isAccent || isSection)) continue;

        results.push({
            x: rect.x - slideRect.x,
            y: rect.y - slideRect.y,
            w: rect.width,
            h: rect.height,
            background: bg,
            borderColor: borderColor,
            borderWidth: borderWidth,
            accent: isAccent
        });
    }
    return JSON.stringify(results);
}"#;

/// Visible elements matching the image selectors, in selector order.
///
/// Each match is tagged with a `data-deck-image` attribute so it can be
/// captured later by selector. Args: selector list, slide index.
pub const SLIDE_IMAGES: &str = r#"function (selectors, slideIndex) {
    const results = [];
    const seen = new Set();
    const slideRect = this.getBoundingClientRect();

    for (const selector of selectors) {
        let matches;
        try {
            matches = this.querySelectorAll(selector);
        } catch (e) {
            continue;
        }
        for (const el of matches) {
            if (seen.has(el)) continue;

            const style = window.getComputedStyle(el);
            const rect = el.getBoundingClientRect();
            if (style.display === 'none' || style.visibility === 'hidden') continue;
            if (rect.width < 1 || rect.height <= 0) continue;

            seen.add(el);
            const marker = slideIndex + '-' + results.length;
            el.setAttribute('data-deck-image', marker);
            results.push({
                x: rect.x - slideRect.x,
                y: rect.y - slideRect.y,
                w: rect.width,
                h: rect.height,
                marker: '[data-deck-image="' + marker + '"]'
            });
        }
    }
    return JSON.stringify(results);
}"#;

/// Elements owning direct text, in two batches.
///
/// `priority` holds matches of the prioritized selectors; `catchAll` holds
/// every other qualifying element in document order. Overlap filtering of
/// the second batch happens on the host. Args: prioritized selectors,
/// exclusion selectors.
pub const SLIDE_TEXT: &str = r#"function (prioritySelectors, exclusionSelectors) {
    const slideRect = this.getBoundingClientRect();
    const exclusion = exclusionSelectors.join(', ');
    const captured = new Set();

    const hasDirectText = (el) => Array.from(el.childNodes).some(
        (node) => node.nodeType === Node.TEXT_NODE && node.nodeValue.trim().length > 0
    );
    const isIconGlyph = (el) => el.tagName === 'I' || Array.from(el.classList).some(
        (c) => c === 'bi' || c === 'fa' || c === 'material-icons' || c.startsWith('bi-') || c.startsWith('fa-')
    );
    const excluded = (el) => {
        if (!exclusion) return false;
        try {
            return el.closest(exclusion) !== null;
        } catch (e) {
            return false;
        }
    };
    const qualifies = (el) => {
        if (captured.has(el) || excluded(el) || isIconGlyph(el) || !hasDirectText(el)) return false;
        // a hidden ancestor leaves no client rects
        if (el.getClientRects().length === 0) return false;
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 || rect.height === 0) return false;
        const style = window.getComputedStyle(el);
        return style.display !== 'none' && style.visibility !== 'hidden';
    };
    const describe = (el) => {
        captured.add(el);
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const anchor = el.closest('a[href]');
        return {
            text: el.innerText,
            tagName: el.tagName,
            x: rect.x - slideRect.x,
            y: rect.y - slideRect.y,
            w: rect.width,
            h: rect.height,
            color: style.color,
            fontSize: style.fontSize,
            fontFamily: style.fontFamily,
            fontWeight: style.fontWeight,
            fontStyle: style.fontStyle,
            textAlign: style.textAlign,
            textTransform: style.textTransform,
            textDecoration: style.textDecorationLine || style.textDecoration,
            href: anchor ? anchor.href : null
        };
    };

    const priority = [];
    for (const selector of prioritySelectors) {
        let matches;
        try {
            matches = this.querySelectorAll(selector);
        } catch (e) {
            continue;
        }
        for (const el of matches) {
            if (qualifies(el)) priority.push(describe(el));
        }
    }

    const catchAll = [];
    for (const el of this.querySelectorAll('*')) {
        if (qualifies(el)) catchAll.push(describe(el));
    }

    return JSON.stringify({ priority: priority, catchAll: catchAll });
}"#;

/// Tag every slide with its index; returns the number of slides.
///
/// Args: slide selector, attribute name.
pub const TAG_SLIDES: &str = r#"function (selector, attribute) {
    const slides = document.querySelectorAll(selector);
    slides.forEach((el, i) => el.setAttribute(attribute, String(i)));
    return slides.length;
}"#;

/// Whether the document has finished loading, fonts included.
pub const DOCUMENT_SETTLED: &str =
    "document.readyState === 'complete' && (!document.fonts || document.fonts.status === 'loaded')";
