// =============================================================================
// Chart Dashboard — embedded single-page UI
// =============================================================================
//
// Served at `/`. The page consumes the same `/api/ohlcv` and `/api/signals`
// endpoints as every other client, so the chart summary and the API can never
// disagree about a signal: the synthesizer runs exactly once, server-side.
//
// On a failed refresh the page keeps its previous chart and shows an inline
// error instead of crashing the update cycle.
// =============================================================================

use axum::response::Html;

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Helios Signal Dashboard</title>
<style>
  body { font-family: -apple-system, "Segoe UI", sans-serif; background: #11151c; color: #dbe2ea; margin: 0; padding: 1.5rem; }
  h1 { font-size: 1.2rem; margin: 0 0 1rem; }
  .controls { display: flex; gap: .75rem; align-items: center; margin-bottom: 1rem; }
  select, button { background: #1c2330; color: #dbe2ea; border: 1px solid #2e3a4e; border-radius: 4px; padding: .35rem .6rem; }
  button { cursor: pointer; }
  #error { color: #ff7b72; margin-left: .5rem; }
  .panel { display: flex; gap: 1.5rem; flex-wrap: wrap; }
  canvas { background: #161b24; border: 1px solid #2e3a4e; border-radius: 6px; }
  .signal-card { background: #161b24; border: 1px solid #2e3a4e; border-radius: 6px; padding: 1rem; min-width: 260px; }
  .action { font-size: 1.6rem; font-weight: 700; text-transform: uppercase; }
  .action.buy { color: #3fb950; }
  .action.sell { color: #ff7b72; }
  .action.wait { color: #d29922; }
  .scores td { padding: .15rem .6rem .15rem 0; font-variant-numeric: tabular-nums; }
  ul { padding-left: 1.2rem; }
</style>
</head>
<body>
<h1>Helios Signal Dashboard</h1>
<div class="controls">
  <select id="symbol">
    <option>BTC/USDT</option>
    <option>ETH/USDT</option>
    <option>BNB/USDT</option>
    <option>SOL/USDT</option>
  </select>
  <select id="timeframe">
    <option>15m</option>
    <option selected>1h</option>
    <option>4h</option>
    <option>1d</option>
  </select>
  <button id="refresh">Refresh</button>
  <span id="error"></span>
</div>
<div class="panel">
  <canvas id="chart" width="840" height="420"></canvas>
  <div class="signal-card">
    <div id="action" class="action wait">wait</div>
    <table class="scores"><tbody id="scores"></tbody></table>
    <ul id="reasons"></ul>
  </div>
</div>
<script>
const qs = (id) => document.getElementById(id);

function drawChart(candles, levels) {
  const canvas = qs('chart');
  const ctx = canvas.getContext('2d');
  const w = canvas.width, h = canvas.height, pad = 40;
  ctx.clearRect(0, 0, w, h);
  if (!candles.length) return;

  const lows = candles.map(c => c.low), highs = candles.map(c => c.high);
  const min = Math.min(...lows), max = Math.max(...highs);
  const span = (max - min) || 1;
  const y = (p) => h - pad - ((p - min) / span) * (h - 2 * pad);
  const step = (w - 2 * pad) / candles.length;

  candles.forEach((c, i) => {
    const x = pad + i * step + step / 2;
    ctx.strokeStyle = ctx.fillStyle = c.close >= c.open ? '#3fb950' : '#ff7b72';
    ctx.beginPath();
    ctx.moveTo(x, y(c.high));
    ctx.lineTo(x, y(c.low));
    ctx.stroke();
    const top = y(Math.max(c.open, c.close));
    const body = Math.max(1, Math.abs(y(c.open) - y(c.close)));
    ctx.fillRect(x - step * 0.35, top, step * 0.7, body);
  });

  for (const [price, color] of [[levels.support, '#3fb950'], [levels.resistance, '#ff7b72']]) {
    ctx.strokeStyle = color;
    ctx.setLineDash([6, 4]);
    ctx.beginPath();
    ctx.moveTo(pad, y(price));
    ctx.lineTo(w - pad, y(price));
    ctx.stroke();
    ctx.setLineDash([]);
    ctx.fillStyle = color;
    ctx.fillText(price.toFixed(2), w - pad + 4, y(price) + 3);
  }
}

function renderSignal(signal) {
  const el = qs('action');
  el.textContent = signal.action;
  el.className = 'action ' + signal.action;
  qs('scores').innerHTML = Object.entries(signal.scores)
    .map(([k, v]) => `<tr><td>${k}</td><td>${v.toFixed(6)}</td></tr>`)
    .join('');
  qs('reasons').innerHTML = signal.reasons.map(r => `<li>${r}</li>`).join('');
}

async function refresh() {
  const symbol = encodeURIComponent(qs('symbol').value);
  const timeframe = qs('timeframe').value;
  try {
    const [ohlcvRes, signalRes] = await Promise.all([
      fetch(`/api/ohlcv?symbol=${symbol}&timeframe=${timeframe}&limit=120`),
      fetch(`/api/signals?symbol=${symbol}&timeframe=${timeframe}&limit=300`),
    ]);
    if (!ohlcvRes.ok) throw new Error((await ohlcvRes.json()).error);
    const ohlcv = await ohlcvRes.json();
    const signal = await signalRes.json();
    drawChart(ohlcv.data, signal.levels);
    renderSignal(signal);
    qs('error').textContent = '';
  } catch (err) {
    // Keep the previous chart; just surface the failure inline.
    qs('error').textContent = `refresh failed: ${err.message}`;
  }
}

qs('refresh').addEventListener('click', refresh);
qs('symbol').addEventListener('change', refresh);
qs('timeframe').addEventListener('change', refresh);
setInterval(refresh, 60000);
refresh();
</script>
</body>
</html>
"#;
